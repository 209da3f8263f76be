use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::ControllerConfig;
use super::context::SessionContext;
use super::handle::{Command, Request, SessionHandle, SessionSnapshot};
use super::id::{generate_session_id, normalize_session_id, SessionIdSource};
use super::session::Session;
use super::state::{AttemptId, LifecycleState, Role};
use super::stats::EndReason;
use crate::capability::CapabilityGate;
use crate::connection::{
    ConnectionManager, EventSink, PeerEvent, PeerEventKind, PeerTransport, SideChannelState,
};
use crate::error::{Result, SessionError};
use crate::speech::{EngineSink, SpeechEngineFactory, SpeechEvent};

/// Top-level state machine for one user's sessions.
///
/// Commands, transport events and speech events all arrive on channels and
/// are handled one at a time in [`SessionController::run`], so session state
/// is only ever touched from that loop.
pub struct SessionController {
    core: ControllerCore,
    inbox: Inbox,
}

struct Inbox {
    commands: mpsc::Receiver<Request>,
    peer: mpsc::UnboundedReceiver<PeerEvent>,
    speech: mpsc::UnboundedReceiver<SpeechEvent>,
}

struct ControllerCore {
    config: ControllerConfig,
    gate: Arc<dyn CapabilityGate>,
    transport: Arc<dyn PeerTransport>,
    speech: Arc<dyn SpeechEngineFactory>,
    id_source: SessionIdSource,
    peer_tx: mpsc::UnboundedSender<PeerEvent>,
    speech_tx: mpsc::UnboundedSender<SpeechEvent>,
    last_attempt: AttemptId,
    context: Option<SessionContext>,
    notice: Option<String>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(
        config: ControllerConfig,
        gate: Arc<dyn CapabilityGate>,
        transport: Arc<dyn PeerTransport>,
        speech: Arc<dyn SpeechEngineFactory>,
    ) -> (Self, SessionHandle) {
        let (command_tx, commands) = mpsc::channel(config.command_buffer.max(1));
        let (peer_tx, peer) = mpsc::unbounded_channel();
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();
        let (snapshots, snapshot_rx) = watch::channel(SessionSnapshot::idle(None));

        let controller = Self {
            core: ControllerCore {
                config,
                gate,
                transport,
                speech,
                id_source: Box::new(generate_session_id),
                peer_tx,
                speech_tx,
                last_attempt: 0,
                context: None,
                notice: None,
                snapshots,
            },
            inbox: Inbox {
                commands,
                peer,
                speech: speech_rx,
            },
        };

        (controller, SessionHandle::new(command_tx, snapshot_rx))
    }

    /// Replace the random host id generator.
    pub fn with_id_source<F>(mut self, source: F) -> Self
    where
        F: FnMut() -> String + Send + 'static,
    {
        self.core.id_source = Box::new(source);
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Dispatch loop. Returns once every `SessionHandle` is dropped.
    pub async fn run(self) {
        let Self { mut core, mut inbox } = self;
        info!("Session controller started (transport: {})", core.transport.name());

        loop {
            tokio::select! {
                request = inbox.commands.recv() => {
                    let Some(Request { command, reply }) = request else {
                        break;
                    };
                    let result = core.handle_command(command).await;
                    core.publish();
                    let _ = reply.send(result.map(|()| core.snapshot()));
                }
                Some(event) = inbox.peer.recv() => {
                    core.handle_peer_event(event).await;
                    core.publish();
                }
                Some(event) = inbox.speech.recv() => {
                    core.handle_speech_event(event).await;
                    core.publish();
                }
            }
        }

        core.enter_idle().await;
        core.publish();
        info!("Session controller stopped");
    }
}

impl ControllerCore {
    fn lifecycle(&self) -> LifecycleState {
        self.context
            .as_ref()
            .map(SessionContext::lifecycle)
            .unwrap_or(LifecycleState::Idle)
    }

    fn snapshot(&self) -> SessionSnapshot {
        let Some(ctx) = &self.context else {
            return SessionSnapshot::idle(self.notice.clone());
        };

        SessionSnapshot {
            lifecycle: ctx.lifecycle(),
            role: Some(ctx.role()),
            session_id: ctx.session.session_id().map(str::to_string),
            local_peer_id: ctx.connection.local_id().map(str::to_string),
            status_message: ctx.session.status_message().to_string(),
            notice: self.notice.clone(),
            link: ctx.connection.link().clone(),
            mic_enabled: ctx.connection.audio().map(|a| a.is_enabled()),
            remote_muted: ctx.remote_muted,
            captioning: ctx.captioning,
            speech_status: ctx.speech_status.clone(),
            transcript: ctx.synchronizer.items().to_vec(),
            summary: ctx.summary.clone(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    fn invalid(&self, command: &Command) -> SessionError {
        SessionError::InvalidState {
            command: command.name(),
            state: self.lifecycle(),
        }
    }

    fn begin_attempt(&mut self, session: Session, role: Role) {
        let attempt = session.attempt();
        let events = EventSink::new(attempt, self.peer_tx.clone());
        let connection = ConnectionManager::new(
            attempt,
            role,
            Arc::clone(&self.transport),
            self.config.traversal.clone(),
            events,
        );
        self.notice = None;
        self.context = Some(SessionContext::new(session, connection));
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        debug!("Handling command {} while {}", command.name(), self.lifecycle());

        match command {
            Command::Host => self.select_host().await,
            Command::Join(target) => self.select_guest(&target).await,
            Command::Hangup => {
                if self.lifecycle() != LifecycleState::Active {
                    return Err(self.invalid(&Command::Hangup));
                }
                if let Some(ctx) = self.context.as_mut() {
                    ctx.end_call(EndReason::LocalHangup).await;
                }
                Ok(())
            }
            Command::Abort => {
                if self.context.is_some() {
                    info!("Aborting session while {}", self.lifecycle());
                }
                self.enter_idle().await;
                Ok(())
            }
            Command::Acknowledge => {
                if self.lifecycle() != LifecycleState::Summarizing {
                    return Err(self.invalid(&Command::Acknowledge));
                }
                self.enter_idle().await;
                Ok(())
            }
            Command::ToggleMic => {
                let enabled = self
                    .context
                    .as_ref()
                    .and_then(|ctx| ctx.connection.toggle_mic());
                match enabled {
                    Some(enabled) => {
                        info!("Microphone {}", if enabled { "unmuted" } else { "muted" });
                        Ok(())
                    }
                    None => Err(self.invalid(&Command::ToggleMic)),
                }
            }
            Command::ToggleDeaf => {
                if matches!(self.lifecycle(), LifecycleState::Idle | LifecycleState::Summarizing) {
                    return Err(self.invalid(&Command::ToggleDeaf));
                }
                if let Some(ctx) = self.context.as_mut() {
                    ctx.remote_muted = !ctx.remote_muted;
                    info!("Remote audio {}", if ctx.remote_muted { "muted" } else { "audible" });
                }
                Ok(())
            }
            Command::Chat(text) => {
                if self.lifecycle() != LifecycleState::Active {
                    return Err(self.invalid(&Command::Chat(text)));
                }
                let text = text.trim();
                if let (Some(ctx), false) = (self.context.as_mut(), text.is_empty()) {
                    ctx.synchronizer.post_chat(text, &ctx.connection).await;
                }
                Ok(())
            }
        }
    }

    async fn select_host(&mut self) -> Result<()> {
        if self.lifecycle() != LifecycleState::Idle {
            return Err(self.invalid(&Command::Host));
        }

        self.last_attempt += 1;
        let mut session = Session::new_host(self.last_attempt);
        session.set_status("Initializing secure channel...");
        self.begin_attempt(session, Role::Host);

        if let Err(e) = self.start_host().await {
            self.fail(&e).await;
            return Err(e);
        }
        Ok(())
    }

    async fn start_host(&mut self) -> Result<()> {
        let Self {
            context,
            gate,
            id_source,
            ..
        } = self;
        let Some(ctx) = context.as_mut() else {
            return Ok(());
        };

        ctx.connection.acquire_capability(gate.as_ref()).await?;

        let id = id_source();
        ctx.pending_id = Some(id.clone());
        ctx.registration_attempts = 1;
        ctx.connection.open_as_host(&id).await
    }

    async fn select_guest(&mut self, target: &str) -> Result<()> {
        if self.lifecycle() != LifecycleState::Idle {
            return Err(self.invalid(&Command::Join(target.to_string())));
        }
        let target = normalize_session_id(target)?;

        self.last_attempt += 1;
        let mut session = Session::new_guest(self.last_attempt, &target);
        session.set_status(format!("Locating channel {}...", target));
        self.begin_attempt(session, Role::Guest);

        if let Err(e) = self.start_guest(&target).await {
            self.fail(&e).await;
            return Err(e);
        }
        Ok(())
    }

    async fn start_guest(&mut self, target: &str) -> Result<()> {
        let Self { context, gate, .. } = self;
        let Some(ctx) = context.as_mut() else {
            return Ok(());
        };

        ctx.connection.acquire_capability(gate.as_ref()).await?;
        ctx.session.set_status("Handshaking...");
        ctx.connection.open_as_guest(target).await
    }

    /// Log, clean up and return to idle with a user-visible notice.
    async fn fail(&mut self, error: &SessionError) {
        error!("Session failed while {}: {}", self.lifecycle(), error);
        self.enter_idle().await;
        self.notice = Some(error.user_message());
    }

    /// Idempotent cleanup; discards the current attempt, if any.
    async fn enter_idle(&mut self) {
        if let Some(mut ctx) = self.context.take() {
            ctx.shutdown().await;
        }
    }

    async fn handle_peer_event(&mut self, event: PeerEvent) {
        let current = self.context.as_ref().map(|ctx| ctx.session.attempt());
        if current != Some(event.attempt) {
            debug!(
                "Ignoring event from stale attempt {} (current {:?}): {:?}",
                event.attempt, current, event.kind
            );
            return;
        }

        let outcome = self.dispatch_peer_event(event.kind).await;
        if let Err(e) = outcome {
            if e.is_terminal() {
                self.fail(&e).await;
            } else {
                warn!("Transient connection error: {}", e);
                if let Some(ctx) = self.context.as_mut() {
                    ctx.session.set_status(format!("Connection Error: {}", e));
                }
            }
        }
    }

    async fn dispatch_peer_event(&mut self, kind: PeerEventKind) -> Result<()> {
        let Self {
            context,
            config,
            speech,
            speech_tx,
            id_source,
            ..
        } = self;
        let Some(ctx) = context.as_mut() else {
            return Ok(());
        };
        let state = ctx.lifecycle();
        let role = ctx.role();

        match kind {
            PeerEventKind::Registered { id } => {
                if role != Role::Host
                    || state != LifecycleState::Initializing
                    || ctx.pending_id.as_deref() != Some(id.as_str())
                {
                    debug!("Ignoring registration of {} while {}", id, state);
                    return Ok(());
                }
                ctx.session.assign_session_id(&id)?;
                ctx.session
                    .transition(LifecycleState::WaitingForPeer, "Waiting for guest...");
                info!("Channel {} is live", id);
            }

            PeerEventKind::RegistrationFailed { id, reason } => {
                if role != Role::Host || state != LifecycleState::Initializing {
                    return Ok(());
                }
                if ctx.registration_attempts > config.registration_retries {
                    return Err(SessionError::RegistrationFailed { id, reason });
                }

                let next_id = id_source();
                warn!(
                    "Channel {} rejected ({}), retrying with {} ({}/{})",
                    id, reason, next_id, ctx.registration_attempts, config.registration_retries
                );
                ctx.registration_attempts += 1;
                ctx.pending_id = Some(next_id.clone());
                ctx.connection.open_as_host(&next_id).await?;
            }

            PeerEventKind::InboundCall { call_id, from } => {
                if role != Role::Host {
                    return Ok(());
                }
                if !ctx.connection.admits(&from) {
                    warn!("Refusing call {} from {}: channel is taken", call_id, from);
                    if let Err(e) = ctx.connection.refuse(&from).await {
                        warn!("Failed to refuse {}: {}", from, e);
                    }
                    return Ok(());
                }
                if state != LifecycleState::WaitingForPeer {
                    warn!("Ignoring call {} from {} while {}", call_id, from, state);
                    return Ok(());
                }
                ctx.session.set_status("Establishing link...");
                ctx.connection.answer_inbound(&call_id, &from).await?;

                let key = ctx.session.session_id().unwrap_or(from.as_str()).to_string();
                let sink = EngineSink::new(ctx.session.attempt(), speech_tx.clone());
                ctx.activate(speech.create(&key), sink, config.max_consecutive_restarts)
                    .await;
            }

            PeerEventKind::InboundSideChannel { from } => {
                if role != Role::Host {
                    return Ok(());
                }
                if !ctx.connection.admits(&from) {
                    warn!("Refusing side-channel from {}: channel is taken", from);
                    if let Err(e) = ctx.connection.refuse(&from).await {
                        warn!("Failed to refuse {}: {}", from, e);
                    }
                    return Ok(());
                }
                if !matches!(state, LifecycleState::WaitingForPeer | LifecycleState::Active)
                    || ctx.connection.link().side_channel == SideChannelState::Open
                {
                    warn!("Ignoring side-channel from {} while {}", from, state);
                    return Ok(());
                }
                ctx.connection.accept_side_channel(&from).await?;
            }

            PeerEventKind::MediaStreamReceived { from } => {
                if role != Role::Guest || state != LifecycleState::Connecting {
                    debug!("Ignoring media stream from {} while {}", from, state);
                    return Ok(());
                }
                ctx.connection.mark_media_active(&from);

                let key = ctx
                    .connection
                    .local_id()
                    .unwrap_or(from.as_str())
                    .to_string();
                let sink = EngineSink::new(ctx.session.attempt(), speech_tx.clone());
                ctx.activate(speech.create(&key), sink, config.max_consecutive_restarts)
                    .await;
            }

            PeerEventKind::SideChannelOpened { peer } => {
                if !matches!(state, LifecycleState::Connecting | LifecycleState::Active) {
                    return Ok(());
                }
                info!("Side-channel to {} open", peer);
                ctx.connection.mark_side_channel_open();
            }

            PeerEventKind::SideChannelData(bytes) => {
                if !(state.is_establishing() || state == LifecycleState::Active) {
                    debug!("Dropping side-channel data while {}", state);
                    return Ok(());
                }
                if let Err(e) = ctx.synchronizer.ingest_remote_bytes(&bytes) {
                    warn!("Failed to merge side-channel message: {}", e);
                }
            }

            PeerEventKind::MediaClosed => {
                ctx.connection.mark_media_closed();
                match state {
                    LifecycleState::Active => ctx.end_call(EndReason::RemoteClosed).await,
                    LifecycleState::Connecting => {
                        let target = ctx.session.session_id().unwrap_or_default().to_string();
                        return Err(SessionError::PeerUnavailable(target));
                    }
                    _ => {}
                }
            }

            PeerEventKind::SideChannelClosed => {
                info!("Side-channel closed by peer");
                ctx.connection.mark_side_channel_closed();
            }

            PeerEventKind::PeerUnavailable { target } => {
                if state.is_establishing() {
                    return Err(SessionError::PeerUnavailable(target));
                }
                warn!("Peer {} reported unavailable while {}", target, state);
            }

            PeerEventKind::TransientError(reason) => {
                warn!("Transient connection error: {}", reason);
                ctx.session.set_status(format!("Connection Error: {}", reason));
            }
        }

        Ok(())
    }

    async fn handle_speech_event(&mut self, event: SpeechEvent) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        if ctx.session.attempt() != event.attempt {
            debug!("Ignoring speech event from stale attempt {}", event.attempt);
            return;
        }
        let Some(adapter) = ctx.speech.as_mut() else {
            return;
        };

        if let Some(capture) = adapter.handle(event.event).await {
            ctx.apply_capture(capture).await;
        }
    }
}
