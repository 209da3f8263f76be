use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::session::AttemptId;

/// Error reported by a recognition engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechErrorKind {
    /// Microphone permission was revoked mid-session
    PermissionRevoked,
    /// Recognition is unavailable on this platform
    NotSupported,
    /// The engine kept ending without producing results
    RestartLimit,
    /// Silence timeout
    NoSpeech,
    /// Recognizer service hiccup
    Network,
    Other(String),
}

impl SpeechErrorKind {
    /// Map an engine error code to a kind.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" | "permission-revoked" => Self::PermissionRevoked,
            "not-supported" | "language-not-supported" => Self::NotSupported,
            "no-speech" => Self::NoSpeech,
            "network" => Self::Network,
            other => Self::Other(other.to_string()),
        }
    }

    /// Terminal kinds disable captioning for the rest of the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::PermissionRevoked | Self::NotSupported | Self::RestartLimit
        )
    }
}

impl fmt::Display for SpeechErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionRevoked => write!(f, "microphone blocked"),
            Self::NotSupported => write!(f, "speech recognition not supported"),
            Self::RestartLimit => write!(f, "speech recognition keeps stopping"),
            Self::NoSpeech => write!(f, "no speech detected"),
            Self::Network => write!(f, "recognizer network error"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Raw event from a recognition engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Result {
        result_index: u32,
        text: String,
        is_final: bool,
    },
    Ended,
    Error(SpeechErrorKind),
}

/// Engine event tagged with the attempt that started the engine
#[derive(Debug, Clone)]
pub struct SpeechEvent {
    pub attempt: AttemptId,
    pub event: EngineEvent,
}

/// Where an engine pushes its events
#[derive(Debug, Clone)]
pub struct EngineSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<SpeechEvent>,
}

impl EngineSink {
    pub fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<SpeechEvent>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Returns false once the controller stopped listening.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx
            .send(SpeechEvent {
                attempt: self.attempt,
                event,
            })
            .is_ok()
    }
}

/// Continuous, interim-results recognition engine
#[async_trait]
pub trait SpeechEngine: Send {
    async fn start(&mut self, sink: EngineSink) -> Result<(), SpeechErrorKind>;

    async fn stop(&mut self);

    fn name(&self) -> &str;
}

/// Builds one engine per session attempt
pub trait SpeechEngineFactory: Send + Sync {
    fn create(&self, session_key: &str) -> Box<dyn SpeechEngine>;
}

/// Engine for hosts without a recognizer; every start reports `NotSupported`
pub struct UnsupportedSpeechEngine;

#[async_trait]
impl SpeechEngine for UnsupportedSpeechEngine {
    async fn start(&mut self, _sink: EngineSink) -> Result<(), SpeechErrorKind> {
        Err(SpeechErrorKind::NotSupported)
    }

    async fn stop(&mut self) {}

    fn name(&self) -> &str {
        "unsupported"
    }
}

impl SpeechEngineFactory for UnsupportedSpeechEngine {
    fn create(&self, _session_key: &str) -> Box<dyn SpeechEngine> {
        Box::new(UnsupportedSpeechEngine)
    }
}
