use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    LocalHangup,
    RemoteClosed,
}

/// Summary shown after a call ends, until acknowledged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSummary {
    /// Channel the call ran on
    pub session_id: Option<String>,

    pub role: Role,

    /// When the attempt started
    pub started_at: DateTime<Utc>,

    /// When media became active
    pub connected_at: Option<DateTime<Utc>>,

    pub ended_at: DateTime<Utc>,

    /// Connected time in seconds, zero if the call never connected
    pub duration_secs: f64,

    /// Items spoken or typed locally
    pub local_items: usize,

    /// Items received from the peer
    pub remote_items: usize,

    /// Items that reached their final text
    pub final_items: usize,

    pub end_reason: EndReason,
}
