//! In-process signaling service
//!
//! Peers on the same [`LoopbackNetwork`] find each other by id and exchange
//! events directly. Delivery is ordered per sender, matching what the
//! side-channel contract asks of a real transport.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::transport::{EventSink, OpenMode, PeerEndpoint, PeerEventKind, PeerTransport};
use super::traversal::TraversalConfig;
use crate::capability::AudioSourceHandle;
use crate::error::{Result, SessionError};

type BoundPeer = Arc<Mutex<Option<String>>>;

fn bound(peer: &BoundPeer) -> Option<String> {
    peer.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

struct PeerSlot {
    sink: EventSink,
    discoverable: bool,
    /// Shared with the endpoint; gates link-scoped deliveries
    peer: BoundPeer,
}

#[derive(Default)]
struct NetworkState {
    peers: HashMap<String, PeerSlot>,
    /// call id -> caller id
    calls: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        // A panicked holder cannot leave the maps half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether `id` is a registered, discoverable host identity
    pub fn is_registered(&self, id: &str) -> bool {
        self.lock()
            .peers
            .get(id)
            .is_some_and(|slot| slot.discoverable)
    }

    /// Number of endpoints currently attached, hosts and guests
    pub fn peer_count(&self) -> usize {
        self.lock().peers.len()
    }

    /// Hand `kind` from `from` to `to`.
    ///
    /// Link-scoped events reach `to` only when `from` is its bound peer.
    fn deliver(&self, from: &str, to: &str, kind: PeerEventKind) -> bool {
        let state = self.lock();
        let Some(slot) = state.peers.get(to) else {
            debug!("Dropping event for departed peer {}", to);
            return false;
        };
        if kind.is_link_scoped() && bound(&slot.peer).as_deref() != Some(from) {
            debug!("Dropping {:?} from unbound peer {} to {}", kind, from, to);
            return false;
        }
        slot.sink.emit(kind)
    }
}

#[async_trait]
impl PeerTransport for LoopbackNetwork {
    async fn open(
        &self,
        mode: OpenMode,
        _traversal: &TraversalConfig,
        events: EventSink,
    ) -> Result<Box<dyn PeerEndpoint>> {
        let mut state = self.lock();
        let peer: BoundPeer = Arc::new(Mutex::new(None));

        let (local_id, owns_slot) = match mode {
            OpenMode::Host { id } => {
                if state.peers.contains_key(&id) {
                    events.emit(PeerEventKind::RegistrationFailed {
                        id: id.clone(),
                        reason: "id already taken".to_string(),
                    });
                    (id, false)
                } else {
                    state.peers.insert(
                        id.clone(),
                        PeerSlot {
                            sink: events.clone(),
                            discoverable: true,
                            peer: Arc::clone(&peer),
                        },
                    );
                    events.emit(PeerEventKind::Registered { id: id.clone() });
                    (id, true)
                }
            }
            OpenMode::Guest => {
                let id = format!("guest-{}", uuid::Uuid::new_v4().simple());
                state.peers.insert(
                    id.clone(),
                    PeerSlot {
                        sink: events.clone(),
                        discoverable: false,
                        peer: Arc::clone(&peer),
                    },
                );
                (id, true)
            }
        };

        info!("Loopback endpoint {} opened", local_id);
        Ok(Box::new(LoopbackEndpoint {
            network: self.clone(),
            local_id,
            owns_slot,
            peer,
        }))
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

struct LoopbackEndpoint {
    network: LoopbackNetwork,
    local_id: String,
    owns_slot: bool,
    peer: BoundPeer,
}

impl LoopbackEndpoint {
    fn peer(&self) -> Option<String> {
        bound(&self.peer)
    }

    fn set_peer(&self, id: &str) {
        *self.peer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(id.to_string());
    }

    fn require_discoverable(&self, target: &str) -> Result<()> {
        if self.network.is_registered(target) {
            Ok(())
        } else {
            Err(SessionError::PeerUnavailable(target.to_string()))
        }
    }
}

#[async_trait]
impl PeerEndpoint for LoopbackEndpoint {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    async fn call(&self, target: &str, _audio: &AudioSourceHandle) -> Result<()> {
        self.require_discoverable(target)?;
        self.set_peer(target);

        let call_id = uuid::Uuid::new_v4().to_string();
        self.network
            .lock()
            .calls
            .insert(call_id.clone(), self.local_id.clone());
        self.network.deliver(
            &self.local_id,
            target,
            PeerEventKind::InboundCall {
                call_id,
                from: self.local_id.clone(),
            },
        );
        Ok(())
    }

    async fn connect(&self, target: &str) -> Result<()> {
        self.require_discoverable(target)?;
        self.set_peer(target);

        self.network.deliver(
            &self.local_id,
            target,
            PeerEventKind::InboundSideChannel {
                from: self.local_id.clone(),
            },
        );
        Ok(())
    }

    async fn answer(&self, call_id: &str, _audio: &AudioSourceHandle) -> Result<()> {
        let caller = self
            .network
            .lock()
            .calls
            .remove(call_id)
            .ok_or_else(|| SessionError::Signaling(format!("unknown call {}", call_id)))?;
        self.set_peer(&caller);

        if !self.network.deliver(
            &self.local_id,
            &caller,
            PeerEventKind::MediaStreamReceived {
                from: self.local_id.clone(),
            },
        ) {
            return Err(SessionError::PeerUnavailable(caller));
        }
        Ok(())
    }

    async fn accept_side_channel(&self, from: &str) -> Result<()> {
        self.set_peer(from);
        if !self.network.deliver(
            &self.local_id,
            from,
            PeerEventKind::SideChannelOpened {
                peer: self.local_id.clone(),
            },
        ) {
            return Err(SessionError::PeerUnavailable(from.to_string()));
        }
        Ok(())
    }

    async fn reject(&self, from: &str) -> Result<()> {
        let local_id = &self.local_id;
        self.network
            .lock()
            .calls
            .retain(|_, caller| caller.as_str() != from);
        self.network.deliver(local_id, from, PeerEventKind::MediaClosed);
        self.network.deliver(local_id, from, PeerEventKind::SideChannelClosed);
        info!("Turned away {}", from);
        Ok(())
    }

    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        let peer = self
            .peer()
            .ok_or_else(|| SessionError::SideChannelSend("no peer".to_string()))?;

        if self.network.deliver(&self.local_id, &peer, PeerEventKind::SideChannelData(payload)) {
            Ok(())
        } else {
            Err(SessionError::SideChannelSend(format!("{} is gone", peer)))
        }
    }

    async fn close_media(&self) -> Result<()> {
        if let Some(peer) = self.peer() {
            self.network.deliver(&self.local_id, &peer, PeerEventKind::MediaClosed);
        }
        Ok(())
    }

    async fn close_side_channel(&self) -> Result<()> {
        if let Some(peer) = self.peer() {
            self.network.deliver(&self.local_id, &peer, PeerEventKind::SideChannelClosed);
        }
        Ok(())
    }

    async fn unregister(&self) -> Result<()> {
        if self.owns_slot {
            let mut state = self.network.lock();
            state.peers.remove(&self.local_id);
            let local_id = &self.local_id;
            state.calls.retain(|_, caller| caller != local_id);
        }
        Ok(())
    }
}
