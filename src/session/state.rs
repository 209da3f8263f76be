use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag of one session attempt; events carrying another tag are stale
pub type AttemptId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Host,
    Guest,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Initializing,
    WaitingForPeer,
    Connecting,
    Active,
    Summarizing,
}

impl LifecycleState {
    /// Whether the state machine has an edge from `self` to `next`.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;

        matches!(
            (self, next),
            (_, Idle)
                | (Idle, Initializing)
                | (Idle, Connecting)
                | (Initializing, WaitingForPeer)
                | (WaitingForPeer, Active)
                | (Connecting, Active)
                | (Active, Summarizing)
        )
    }

    /// States in which the attempt is still establishing the link
    pub fn is_establishing(self) -> bool {
        matches!(
            self,
            LifecycleState::Initializing | LifecycleState::WaitingForPeer | LifecycleState::Connecting
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::WaitingForPeer => "waiting for peer",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Summarizing => "summarizing",
        };
        write!(f, "{}", name)
    }
}
