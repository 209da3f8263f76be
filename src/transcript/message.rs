use serde::{Deserialize, Serialize};

use super::item::TranscriptItem;
use crate::error::Result;

/// Wire unit exchanged over the side-channel
///
/// Serialized as `{"kind": "TRANSCRIPT", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SideChannelMessage {
    /// Interim or final speech transcript
    Transcript(TranscriptItem),

    /// Typed text line, always final
    Chat(TranscriptItem),
}

impl SideChannelMessage {
    pub fn item(&self) -> &TranscriptItem {
        match self {
            Self::Transcript(item) | Self::Chat(item) => item,
        }
    }

    pub fn into_item(self) -> TranscriptItem {
        match self {
            Self::Transcript(item) | Self::Chat(item) => item,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transcript(_) => "TRANSCRIPT",
            Self::Chat(_) => "CHAT",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
