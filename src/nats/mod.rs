pub mod client;
pub mod messages;
pub mod transport;

pub use client::NatsClient;
pub use messages::{PresenceReply, SignalMessage, TranscriptMessage};
pub use transport::NatsTransport;
