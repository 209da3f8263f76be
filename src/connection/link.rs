use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaState {
    Absent,
    Negotiating,
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideChannelState {
    Absent,
    Opening,
    Open,
    Closed,
}

/// Media and side-channel state toward the remote party.
///
/// Only the connection manager mutates it; everyone else gets a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerLink {
    pub media: MediaState,
    pub side_channel: SideChannelState,
    pub remote_peer: Option<String>,
}

impl PeerLink {
    pub(crate) fn new() -> Self {
        Self {
            media: MediaState::Absent,
            side_channel: SideChannelState::Absent,
            remote_peer: None,
        }
    }

    pub fn media_live(&self) -> bool {
        matches!(self.media, MediaState::Negotiating | MediaState::Active)
    }

    pub fn side_channel_live(&self) -> bool {
        matches!(self.side_channel, SideChannelState::Opening | SideChannelState::Open)
    }

    pub(crate) fn close(&mut self) {
        if self.media != MediaState::Absent {
            self.media = MediaState::Closed;
        }
        if self.side_channel != SideChannelState::Absent {
            self.side_channel = SideChannelState::Closed;
        }
    }
}

impl Default for PeerLink {
    fn default() -> Self {
        Self::new()
    }
}
