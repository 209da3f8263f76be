//! Speech capture
//!
//! Recognition engines push raw events into the controller; the
//! `SpeechCaptureAdapter` turns them into transcript fragments and owns the
//! restart policy.

mod adapter;
mod engine;
mod nats;

pub use adapter::{CaptureEvent, SpeechCaptureAdapter};
pub use engine::{
    EngineEvent, EngineSink, SpeechEngine, SpeechEngineFactory, SpeechErrorKind, SpeechEvent,
    UnsupportedSpeechEngine,
};
pub use nats::{NatsSpeechEngine, NatsSpeechFactory};
