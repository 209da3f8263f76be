use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::state::{AttemptId, LifecycleState, Role};
use crate::error::{Result, SessionError};

/// State of one call attempt, from role selection to teardown
#[derive(Debug, Clone)]
pub struct Session {
    attempt: AttemptId,
    role: Role,
    session_id: Option<String>,
    lifecycle: LifecycleState,
    status_message: String,
    started_at: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Host session; the id is assigned once registration confirms it.
    pub fn new_host(attempt: AttemptId) -> Self {
        Self::new(attempt, Role::Host, None, LifecycleState::Initializing)
    }

    /// Guest session toward an already-known channel id.
    pub fn new_guest(attempt: AttemptId, target: &str) -> Self {
        Self::new(
            attempt,
            Role::Guest,
            Some(target.to_string()),
            LifecycleState::Connecting,
        )
    }

    fn new(
        attempt: AttemptId,
        role: Role,
        session_id: Option<String>,
        lifecycle: LifecycleState,
    ) -> Self {
        info!("Session attempt {} created as {}", attempt, role);
        Self {
            attempt,
            role,
            session_id,
            lifecycle,
            status_message: String::new(),
            started_at: Utc::now(),
            connected_at: None,
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    /// Accept the session id. It cannot change once set.
    pub fn assign_session_id(&mut self, id: &str) -> Result<()> {
        match &self.session_id {
            Some(existing) if existing == id => Ok(()),
            Some(existing) => Err(SessionError::InvalidSessionId(format!(
                "session already bound to {}, refusing {}",
                existing, id
            ))),
            None => {
                self.session_id = Some(id.to_string());
                Ok(())
            }
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    /// Move to `next`, refusing edges the state machine does not have.
    pub fn transition(&mut self, next: LifecycleState, status: impl Into<String>) -> bool {
        if !self.lifecycle.can_transition_to(next) {
            warn!(
                "Session attempt {}: refusing transition {} -> {}",
                self.attempt, self.lifecycle, next
            );
            return false;
        }

        let status = status.into();
        info!(
            "Session attempt {}: {} -> {} ({})",
            self.attempt, self.lifecycle, next, status
        );
        if next == LifecycleState::Active {
            self.connected_at = Some(Utc::now());
        }
        self.lifecycle = next;
        self.status_message = status;
        true
    }
}
