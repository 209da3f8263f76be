use thiserror::Error;

use crate::session::{LifecycleState, Role};
use crate::speech::SpeechErrorKind;

/// Everything that can go wrong while establishing or running a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Microphone access denied")]
    CapabilityDenied,

    #[error("Channel {0} not found or peer is offline")]
    PeerUnavailable(String),

    #[error("Failed to register session id {id}: {reason}")]
    RegistrationFailed { id: String, reason: String },

    #[error("Side-channel send failed: {0}")]
    SideChannelSend(String),

    #[error("Speech engine error: {0}")]
    SpeechEngine(SpeechErrorKind),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("{command} is not allowed while {state}")]
    InvalidState {
        command: &'static str,
        state: LifecycleState,
    },

    #[error("{operation} is not available to a {role} session")]
    RoleMismatch {
        operation: &'static str,
        role: Role,
    },

    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Malformed side-channel message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Session controller is not running")]
    ControllerGone,
}

impl SessionError {
    /// Terminal errors end the current attempt and force a return to idle.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::CapabilityDenied
            | Self::PeerUnavailable(_)
            | Self::RegistrationFailed { .. } => true,
            Self::SpeechEngine(kind) => kind.is_terminal(),
            _ => false,
        }
    }

    /// Text shown to the user when this error aborts a session.
    pub fn user_message(&self) -> String {
        match self {
            Self::CapabilityDenied => "Microphone access is required to use EchoLink.".to_string(),
            Self::PeerUnavailable(_) => "Channel ID not found or peer is offline.".to_string(),
            Self::RegistrationFailed { .. } => {
                "Could not open a channel. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
