use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::session::Session;
use super::stats::{CallSummary, EndReason};
use super::state::{LifecycleState, Role};
use crate::connection::ConnectionManager;
use crate::speech::{CaptureEvent, EngineSink, SpeechCaptureAdapter, SpeechEngine};
use crate::transcript::{Sender, TranscriptSynchronizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptioningState {
    Off,
    Listening,
    Disabled,
}

/// Everything owned by one attempt.
///
/// Built fresh when a role is selected and dropped as a whole when the
/// controller returns to idle.
pub struct SessionContext {
    pub session: Session,
    pub connection: ConnectionManager,
    pub synchronizer: TranscriptSynchronizer,
    pub speech: Option<SpeechCaptureAdapter>,
    pub captioning: CaptioningState,
    pub speech_status: Option<String>,
    pub remote_muted: bool,
    pub pending_id: Option<String>,
    pub registration_attempts: u32,
    pub summary: Option<CallSummary>,
}

impl SessionContext {
    pub fn new(session: Session, connection: ConnectionManager) -> Self {
        Self {
            session,
            connection,
            synchronizer: TranscriptSynchronizer::new(),
            speech: None,
            captioning: CaptioningState::Off,
            speech_status: None,
            remote_muted: false,
            pending_id: None,
            registration_attempts: 0,
            summary: None,
        }
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.session.lifecycle()
    }

    pub fn role(&self) -> Role {
        self.session.role()
    }

    /// Enter `Active` and start captioning.
    pub async fn activate(&mut self, engine: Box<dyn SpeechEngine>, sink: EngineSink, max_restarts: u32) {
        if !self
            .session
            .transition(LifecycleState::Active, "SECURE CONNECTION ACTIVE")
        {
            return;
        }

        let mut adapter = SpeechCaptureAdapter::new(engine, sink, max_restarts);
        match adapter.start().await {
            Ok(()) => self.captioning = CaptioningState::Listening,
            Err(kind) => {
                warn!("Captioning unavailable: {}", kind);
                self.captioning = if kind.is_terminal() {
                    CaptioningState::Disabled
                } else {
                    CaptioningState::Off
                };
                self.speech_status = Some(format!("Captioning unavailable: {}", kind));
            }
        }
        self.speech = Some(adapter);
    }

    /// Route an adapter output into the transcript or the speech status.
    pub async fn apply_capture(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Fragment { text, is_final } => {
                if self.lifecycle() != LifecycleState::Active {
                    return;
                }
                self.synchronizer
                    .ingest_local(&text, is_final, &self.connection)
                    .await;
            }
            CaptureEvent::Status(status) => {
                self.speech_status = Some(status);
            }
            CaptureEvent::CaptioningDisabled(kind) => {
                self.captioning = CaptioningState::Disabled;
                self.speech_status = Some(format!("Captioning unavailable: {}", kind));
            }
        }
    }

    async fn stop_speech(&mut self) {
        if let Some(adapter) = self.speech.as_mut() {
            adapter.stop().await;
        }
        if self.captioning == CaptioningState::Listening {
            self.captioning = CaptioningState::Off;
        }
    }

    /// Tear the link down and move to `Summarizing`.
    pub async fn end_call(&mut self, reason: EndReason) {
        self.stop_speech().await;
        self.connection.teardown().await;

        let ended_at = Utc::now();
        let duration_secs = self
            .session
            .connected_at()
            .map(|t| ended_at.signed_duration_since(t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        let items = self.synchronizer.items();

        self.summary = Some(CallSummary {
            session_id: self.session.session_id().map(str::to_string),
            role: self.session.role(),
            started_at: self.session.started_at(),
            connected_at: self.session.connected_at(),
            ended_at,
            duration_secs,
            local_items: self.synchronizer.count_by(Sender::Local),
            remote_items: self.synchronizer.count_by(Sender::Remote),
            final_items: items.iter().filter(|i| i.is_final).count(),
            end_reason: reason,
        });

        let status = match reason {
            EndReason::LocalHangup => "Call ended",
            EndReason::RemoteClosed => "Peer left the call",
        };
        self.session.transition(LifecycleState::Summarizing, status);
    }

    /// Release everything. Safe to call in any state, any number of times.
    pub async fn shutdown(&mut self) {
        self.stop_speech().await;
        self.connection.teardown().await;
        self.session.transition(LifecycleState::Idle, "Disconnected");
        info!("Session attempt {} discarded", self.session.attempt());
    }
}
