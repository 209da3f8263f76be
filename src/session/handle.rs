use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use super::context::CaptioningState;
use super::state::{LifecycleState, Role};
use super::stats::CallSummary;
use crate::connection::PeerLink;
use crate::error::{Result, SessionError};
use crate::transcript::TranscriptItem;

/// Requests accepted by the session controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Host,
    Join(String),
    Hangup,
    Abort,
    Acknowledge,
    ToggleMic,
    ToggleDeaf,
    Chat(String),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Join(_) => "join",
            Self::Hangup => "hangup",
            Self::Abort => "abort",
            Self::Acknowledge => "acknowledge",
            Self::ToggleMic => "toggle_mic",
            Self::ToggleDeaf => "toggle_deaf",
            Self::Chat(_) => "chat",
        }
    }
}

pub(crate) struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Result<SessionSnapshot>>,
}

/// Read-only view of the controller, republished after every event
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub lifecycle: LifecycleState,
    pub role: Option<Role>,
    pub session_id: Option<String>,
    pub local_peer_id: Option<String>,
    pub status_message: String,
    /// Explanation of the last terminal error
    pub notice: Option<String>,
    pub link: PeerLink,
    pub mic_enabled: Option<bool>,
    pub remote_muted: bool,
    pub captioning: CaptioningState,
    pub speech_status: Option<String>,
    pub transcript: Vec<TranscriptItem>,
    pub summary: Option<CallSummary>,
}

impl SessionSnapshot {
    pub fn idle(notice: Option<String>) -> Self {
        Self {
            lifecycle: LifecycleState::Idle,
            role: None,
            session_id: None,
            local_peer_id: None,
            status_message: String::new(),
            notice,
            link: PeerLink::default(),
            mic_enabled: None,
            remote_muted: false,
            captioning: CaptioningState::Off,
            speech_status: None,
            transcript: Vec::new(),
            summary: None,
        }
    }
}

/// Cloneable front door to a running controller
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Request>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Request>,
        snapshots: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            commands,
            snapshots,
        }
    }

    /// Send a command and wait until the controller has handled it.
    pub async fn request(&self, command: Command) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| SessionError::ControllerGone)?;
        response.await.map_err(|_| SessionError::ControllerGone)?
    }

    pub async fn host(&self) -> Result<SessionSnapshot> {
        self.request(Command::Host).await
    }

    pub async fn join(&self, session_id: impl Into<String>) -> Result<SessionSnapshot> {
        self.request(Command::Join(session_id.into())).await
    }

    pub async fn hangup(&self) -> Result<SessionSnapshot> {
        self.request(Command::Hangup).await
    }

    pub async fn abort(&self) -> Result<SessionSnapshot> {
        self.request(Command::Abort).await
    }

    pub async fn acknowledge(&self) -> Result<SessionSnapshot> {
        self.request(Command::Acknowledge).await
    }

    pub async fn toggle_mic(&self) -> Result<SessionSnapshot> {
        self.request(Command::ToggleMic).await
    }

    pub async fn toggle_deaf(&self) -> Result<SessionSnapshot> {
        self.request(Command::ToggleDeaf).await
    }

    pub async fn chat(&self, text: impl Into<String>) -> Result<SessionSnapshot> {
        self.request(Command::Chat(text.into())).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| SessionError::ControllerGone)?;
        Ok((*snapshot).clone())
    }
}
