use rand::Rng;
use serde::{Deserialize, Serialize};

/// Which party produced a transcript item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Local,
    Remote,
}

/// One utterance's evolving text state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptItem {
    /// Stable identifier, unique within a session
    pub id: String,

    /// Advisory on the wire; the receiver overwrites it
    pub sender: Sender,

    /// Current best transcript
    pub text: String,

    /// Whether the recognizer has committed this utterance
    pub is_final: bool,

    /// Milliseconds since the Unix epoch, non-decreasing per id
    pub timestamp: i64,
}

impl TranscriptItem {
    pub fn is_pending_local(&self) -> bool {
        self.sender == Sender::Local && !self.is_final
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Mints item ids of the form `<millis>-<suffix>-<seq>`.
///
/// The suffix is random per generator so the two parties never mint the same
/// id; the sequence keeps ids unique when two items land in the same millisecond.
#[derive(Debug, Clone)]
pub struct ItemIdGenerator {
    suffix: String,
    sequence: u64,
}

impl ItemIdGenerator {
    pub fn new() -> Self {
        let suffix: u32 = rand::rng().random();
        Self {
            suffix: format!("{:08x}", suffix),
            sequence: 0,
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn next_id(&mut self, timestamp: i64) -> String {
        self.sequence += 1;
        format!("{}-{}-{}", timestamp, self.suffix, self.sequence)
    }
}

impl Default for ItemIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
