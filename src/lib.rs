pub mod capability;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod nats;
pub mod session;
pub mod speech;
pub mod transcript;

pub use capability::{AudioSourceHandle, CapabilityGate, ConfiguredCapabilityGate, PermissionStatus};
pub use config::Config;
pub use connection::{ConnectionManager, LoopbackNetwork, PeerTransport, TraversalConfig};
pub use error::{Result, SessionError};
pub use http::{create_router, AppState};
pub use nats::{NatsClient, NatsTransport, SignalMessage, TranscriptMessage};
pub use session::{
    Command, LifecycleState, Role, SessionController, SessionHandle, SessionSnapshot,
};
pub use speech::{NatsSpeechFactory, SpeechCaptureAdapter, SpeechEngine, SpeechEngineFactory};
pub use transcript::{Sender, SideChannelMessage, TranscriptItem, TranscriptSynchronizer};
