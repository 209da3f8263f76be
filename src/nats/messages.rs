use serde::{Deserialize, Serialize};

/// Signaling message exchanged on a peer's inbox subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    /// Media call request
    Call { call_id: String, from: String },
    /// Callee accepted the media call
    Answer { call_id: String, from: String },
    /// Side-channel open request
    Connect { from: String },
    /// Callee accepted the side-channel
    Accept { from: String },
    /// Side-channel frame, the JSON text of a side-channel message
    Data { from: String, payload: String },
    /// Media link closed
    Hangup { from: String },
    /// Side-channel closed
    Close { from: String },
}

impl SignalMessage {
    pub fn from_id(&self) -> &str {
        match self {
            Self::Call { from, .. }
            | Self::Answer { from, .. }
            | Self::Connect { from }
            | Self::Accept { from }
            | Self::Data { from, .. }
            | Self::Hangup { from }
            | Self::Close { from } => from,
        }
    }
}

/// Reply sent by a live host to a presence probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceReply {
    pub id: String,
    pub accepting: bool,
}

/// Transcript message received from STT service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}
