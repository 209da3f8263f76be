//! Transcript synchronization
//!
//! Local speech fragments become [`TranscriptItem`]s in a shared, ordered
//! sequence and are mirrored to the peer as [`SideChannelMessage`]s. Remote
//! messages merge into the same sequence by id.

mod item;
mod message;
mod synchronizer;

pub use item::{ItemIdGenerator, Sender, TranscriptItem};
pub use message::SideChannelMessage;
pub use synchronizer::{MergeOutcome, SideChannelSink, TranscriptSynchronizer};
