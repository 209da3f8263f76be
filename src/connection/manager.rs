use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::link::{MediaState, PeerLink, SideChannelState};
use super::transport::{EventSink, OpenMode, PeerEndpoint, PeerTransport};
use super::traversal::TraversalConfig;
use crate::capability::{AudioSourceHandle, CapabilityGate};
use crate::error::{Result, SessionError};
use crate::session::{AttemptId, Role};
use crate::transcript::{SideChannelMessage, SideChannelSink};

/// Owns the local audio source and the link to the peer for one attempt
pub struct ConnectionManager {
    attempt: AttemptId,
    role: Role,
    transport: Arc<dyn PeerTransport>,
    traversal: TraversalConfig,
    events: EventSink,
    audio: Option<AudioSourceHandle>,
    endpoint: Option<Box<dyn PeerEndpoint>>,
    link: PeerLink,
}

impl ConnectionManager {
    pub fn new(
        attempt: AttemptId,
        role: Role,
        transport: Arc<dyn PeerTransport>,
        traversal: TraversalConfig,
        events: EventSink,
    ) -> Self {
        Self {
            attempt,
            role,
            transport,
            traversal,
            events,
            audio: None,
            endpoint: None,
            link: PeerLink::new(),
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn link(&self) -> &PeerLink {
        &self.link
    }

    pub fn audio(&self) -> Option<&AudioSourceHandle> {
        self.audio.as_ref()
    }

    pub fn local_id(&self) -> Option<&str> {
        self.endpoint.as_ref().map(|e| e.local_id())
    }

    /// Whether `peer` may use this link: the bound peer, or anyone while unbound.
    pub fn admits(&self, peer: &str) -> bool {
        self.link
            .remote_peer
            .as_deref()
            .map_or(true, |bound| bound == peer)
    }

    /// True while any audio, link or identity resource is still held
    pub fn holds_resources(&self) -> bool {
        self.audio.is_some() || self.endpoint.is_some()
    }

    /// Ask the gate for the microphone and keep the source handle.
    pub async fn acquire_capability(&mut self, gate: &dyn CapabilityGate) -> Result<()> {
        if self.audio.is_some() {
            return Ok(());
        }

        let grant = gate.request_microphone_access().await;
        match grant.handle {
            Some(handle) if grant.is_granted() => {
                info!("Microphone granted: {}", handle.label());
                self.audio = Some(handle);
                Ok(())
            }
            _ => Err(SessionError::CapabilityDenied),
        }
    }

    /// Register `id` with the signaling service.
    ///
    /// A previous registration attempt of this manager is dropped first, so
    /// this doubles as retry-with-new-id.
    pub async fn open_as_host(&mut self, id: &str) -> Result<()> {
        if self.role != Role::Host {
            return Err(SessionError::RoleMismatch {
                operation: "open_as_host",
                role: self.role,
            });
        }

        if let Some(previous) = self.endpoint.take() {
            if let Err(e) = previous.unregister().await {
                warn!("Failed to drop previous registration: {}", e);
            }
        }

        info!(
            "Registering channel {} via {} ({} ICE servers, {} TURN)",
            id,
            self.transport.name(),
            self.traversal.ice_servers.len(),
            self.traversal.turn_count()
        );

        let endpoint = self
            .transport
            .open(
                OpenMode::Host { id: id.to_string() },
                &self.traversal,
                self.events.clone(),
            )
            .await?;
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Open the side-channel and the media call toward `target` concurrently.
    pub async fn open_as_guest(&mut self, target: &str) -> Result<()> {
        if self.role != Role::Guest {
            return Err(SessionError::RoleMismatch {
                operation: "open_as_guest",
                role: self.role,
            });
        }
        let audio = self.audio.clone().ok_or(SessionError::CapabilityDenied)?;

        let endpoint = self
            .transport
            .open(OpenMode::Guest, &self.traversal, self.events.clone())
            .await?;
        info!("Guest endpoint {} calling channel {}", endpoint.local_id(), target);

        self.link.media = MediaState::Negotiating;
        self.link.side_channel = SideChannelState::Opening;
        self.link.remote_peer = Some(target.to_string());

        let (call, connect) = tokio::join!(endpoint.call(target, &audio), endpoint.connect(target));
        self.endpoint = Some(endpoint);

        for outcome in [call, connect] {
            if let Err(e) = outcome {
                if e.is_terminal() {
                    return Err(e);
                }
                warn!("Negotiation with {} reported: {}", target, e);
            }
        }
        Ok(())
    }

    /// Answer an inbound call with the local audio source.
    pub async fn answer_inbound(&mut self, call_id: &str, from: &str) -> Result<()> {
        let audio = self.audio.clone().ok_or(SessionError::CapabilityDenied)?;
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| SessionError::Signaling("no endpoint to answer on".to_string()))?;

        endpoint.answer(call_id, &audio).await?;
        self.link.media = MediaState::Active;
        self.link.remote_peer = Some(from.to_string());
        info!("Answered call {} from {}", call_id, from);
        Ok(())
    }

    pub async fn accept_side_channel(&mut self, from: &str) -> Result<()> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| SessionError::Signaling("no endpoint to accept on".to_string()))?;

        endpoint.accept_side_channel(from).await?;
        self.link.side_channel = SideChannelState::Open;
        self.link.remote_peer.get_or_insert_with(|| from.to_string());
        info!("Side-channel from {} open", from);
        Ok(())
    }

    /// Refuse a call or side-channel from someone other than the bound peer.
    pub async fn refuse(&self, from: &str) -> Result<()> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| SessionError::Signaling("no endpoint to refuse on".to_string()))?;

        endpoint.reject(from).await?;
        warn!("Refused {} on attempt {}", from, self.attempt);
        Ok(())
    }

    pub fn mark_media_active(&mut self, from: &str) {
        self.link.media = MediaState::Active;
        self.link.remote_peer.get_or_insert_with(|| from.to_string());
    }

    pub fn mark_side_channel_open(&mut self) {
        self.link.side_channel = SideChannelState::Open;
    }

    pub fn mark_media_closed(&mut self) {
        if self.link.media != MediaState::Absent {
            self.link.media = MediaState::Closed;
        }
    }

    pub fn mark_side_channel_closed(&mut self) {
        if self.link.side_channel != SideChannelState::Absent {
            self.link.side_channel = SideChannelState::Closed;
        }
    }

    /// Flip the local mic. `None` when no audio source is held.
    pub fn toggle_mic(&self) -> Option<bool> {
        self.audio.as_ref().map(AudioSourceHandle::toggle_enabled)
    }

    /// Release audio tracks, media link, side-channel and identity, in that order.
    ///
    /// Tolerates any subset already being released; calling it again is a no-op.
    pub async fn teardown(&mut self) {
        if let Some(audio) = self.audio.take() {
            audio.release();
        }

        if let Some(endpoint) = self.endpoint.take() {
            if self.link.media_live() {
                if let Err(e) = endpoint.close_media().await {
                    warn!("Failed to close media link: {}", e);
                }
            }
            if self.link.side_channel_live() {
                if let Err(e) = endpoint.close_side_channel().await {
                    warn!("Failed to close side-channel: {}", e);
                }
            }
            if let Err(e) = endpoint.unregister().await {
                warn!("Failed to unregister {}: {}", endpoint.local_id(), e);
            }
            info!("Connection for attempt {} torn down", self.attempt);
        }

        self.link.close();
    }
}

#[async_trait]
impl SideChannelSink for ConnectionManager {
    fn is_open(&self) -> bool {
        self.endpoint.is_some() && self.link.side_channel == SideChannelState::Open
    }

    async fn send(&self, message: &SideChannelMessage) -> Result<()> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| SessionError::SideChannelSend("side-channel released".to_string()))?;

        let payload = message.encode()?;
        endpoint
            .send(payload)
            .await
            .map_err(|e| SessionError::SideChannelSend(e.to_string()))
    }
}
