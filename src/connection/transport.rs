use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traversal::TraversalConfig;
use crate::capability::AudioSourceHandle;
use crate::error::Result;
use crate::session::AttemptId;

/// How an endpoint joins the signaling service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenMode {
    /// Register `id` as a public, discoverable identity
    Host { id: String },
    /// Anonymous, service-assigned identity; never discoverable
    Guest,
}

/// Asynchronous outcome reported by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEventKind {
    Registered { id: String },
    RegistrationFailed { id: String, reason: String },
    InboundCall { call_id: String, from: String },
    InboundSideChannel { from: String },
    MediaStreamReceived { from: String },
    MediaClosed,
    SideChannelOpened { peer: String },
    SideChannelData(Vec<u8>),
    SideChannelClosed,
    PeerUnavailable { target: String },
    TransientError(String),
}

impl PeerEventKind {
    /// Events that only the bound peer of a link may cause.
    ///
    /// Transports drop these when they come from anyone else; calls and
    /// side-channel offers pass through so the controller can refuse them.
    pub fn is_link_scoped(&self) -> bool {
        matches!(
            self,
            Self::MediaStreamReceived { .. }
                | Self::MediaClosed
                | Self::SideChannelOpened { .. }
                | Self::SideChannelData(_)
                | Self::SideChannelClosed
        )
    }
}

#[derive(Debug, Clone)]
pub struct PeerEvent {
    pub attempt: AttemptId,
    pub kind: PeerEventKind,
}

/// Where a transport reports events for one attempt
#[derive(Debug, Clone)]
pub struct EventSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl EventSink {
    pub fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<PeerEvent>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Returns false once the controller is gone.
    pub fn emit(&self, kind: PeerEventKind) -> bool {
        self.tx
            .send(PeerEvent {
                attempt: self.attempt,
                kind,
            })
            .is_ok()
    }
}

/// Signaling/relay service connector
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Open an endpoint. Host registration outcome arrives as a
    /// `Registered` or `RegistrationFailed` event.
    async fn open(
        &self,
        mode: OpenMode,
        traversal: &TraversalConfig,
        events: EventSink,
    ) -> Result<Box<dyn PeerEndpoint>>;

    fn name(&self) -> &str;
}

/// One peer's presence on the signaling service
#[async_trait]
pub trait PeerEndpoint: Send + Sync {
    fn local_id(&self) -> &str;

    /// Place a media call. Fails with `PeerUnavailable` if `target` is unknown.
    async fn call(&self, target: &str, audio: &AudioSourceHandle) -> Result<()>;

    /// Open the side-channel. Fails with `PeerUnavailable` if `target` is unknown.
    async fn connect(&self, target: &str) -> Result<()>;

    async fn answer(&self, call_id: &str, audio: &AudioSourceHandle) -> Result<()>;

    async fn accept_side_channel(&self, from: &str) -> Result<()>;

    /// Turn away a caller or connector without binding to it.
    /// `from` sees its media and side-channel closed.
    async fn reject(&self, from: &str) -> Result<()>;

    async fn send(&self, payload: Vec<u8>) -> Result<()>;

    async fn close_media(&self) -> Result<()>;

    async fn close_side_channel(&self) -> Result<()>;

    /// Drop the identity from the signaling service
    async fn unregister(&self) -> Result<()>;
}
