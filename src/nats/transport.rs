//! Signaling over NATS
//!
//! Each endpoint listens on `{prefix}.peer.{id}` for [`SignalMessage`]s.
//! Hosts also answer presence probes on `{prefix}.presence.{id}`; a probe
//! that gets no reply means the id is free (or the host is offline).
//!
//! Only signaling and side-channel frames travel over NATS. Media state
//! follows the call/answer/hangup exchange.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::NatsClient;
use super::messages::{PresenceReply, SignalMessage};
use crate::capability::AudioSourceHandle;
use crate::connection::{EventSink, OpenMode, PeerEndpoint, PeerEventKind, PeerTransport, TraversalConfig};
use crate::error::{Result, SessionError};

pub struct NatsTransport {
    client: NatsClient,
    prefix: String,
    presence_timeout: Duration,
}

impl NatsTransport {
    pub fn new(client: NatsClient, prefix: impl Into<String>, presence_timeout: Duration) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            presence_timeout,
        }
    }

    fn presence_subject(&self, id: &str) -> String {
        format!("{}.presence.{}", self.prefix, id)
    }

    fn inbox_subject(&self, id: &str) -> String {
        format!("{}.peer.{}", self.prefix, id)
    }
}

fn signaling(e: anyhow::Error) -> SessionError {
    SessionError::Signaling(format!("{:#}", e))
}

#[async_trait]
impl PeerTransport for NatsTransport {
    async fn open(
        &self,
        mode: OpenMode,
        traversal: &TraversalConfig,
        events: EventSink,
    ) -> Result<Box<dyn PeerEndpoint>> {
        debug!(
            "Opening NATS endpoint ({} ICE servers, policy {:?})",
            traversal.ice_servers.len(),
            traversal.transport_policy
        );

        let calls = Arc::new(Mutex::new(HashMap::new()));
        let peer: BoundPeer = Arc::new(Mutex::new(None));
        let mut tasks = Vec::new();

        let (local_id, hosting) = match mode {
            OpenMode::Host { id } => {
                let presence = self.presence_subject(&id);
                if self
                    .client
                    .probe(&presence, self.presence_timeout)
                    .await
                    .map_err(signaling)?
                    .is_some()
                {
                    events.emit(PeerEventKind::RegistrationFailed {
                        id: id.clone(),
                        reason: "id already taken".to_string(),
                    });
                    return Ok(Box::new(NatsEndpoint::detached(self, id)));
                }

                let subscriber = self.client.subscribe(&presence).await.map_err(signaling)?;
                tasks.push(spawn_presence_responder(self.client.clone(), subscriber, id.clone()));
                (id, true)
            }
            OpenMode::Guest => (format!("guest-{}", Uuid::new_v4().simple()), false),
        };

        let inbox = self
            .client
            .subscribe(&self.inbox_subject(&local_id))
            .await
            .map_err(signaling)?;
        tasks.push(spawn_inbox_listener(
            inbox,
            events.clone(),
            Arc::clone(&calls),
            Arc::clone(&peer),
        ));

        if hosting {
            events.emit(PeerEventKind::Registered { id: local_id.clone() });
        }

        info!("NATS endpoint {} opened", local_id);
        Ok(Box::new(NatsEndpoint {
            client: self.client.clone(),
            prefix: self.prefix.clone(),
            presence_timeout: self.presence_timeout,
            local_id,
            peer,
            calls,
            tasks: Mutex::new(tasks),
        }))
    }

    fn name(&self) -> &str {
        "nats"
    }
}

fn spawn_presence_responder(
    client: NatsClient,
    mut subscriber: async_nats::Subscriber,
    id: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = subscriber.next().await {
            let Some(reply) = msg.reply else {
                continue;
            };
            let answer = PresenceReply {
                id: id.clone(),
                accepting: true,
            };
            if let Err(e) = client.publish_json(reply.as_str(), &answer).await {
                warn!("Failed to answer presence probe for {}: {:#}", id, e);
            }
        }
    })
}

type BoundPeer = Arc<Mutex<Option<String>>>;

fn bound(peer: &BoundPeer) -> Option<String> {
    peer.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Map an inbox signal to a peer event.
///
/// Link traffic is dropped unless it comes from `bound_peer`; anyone may
/// still offer a call or a side-channel.
fn signal_event(signal: SignalMessage, bound_peer: Option<&str>) -> Option<PeerEventKind> {
    let from = signal.from_id().to_string();
    let kind = match signal {
        SignalMessage::Call { call_id, from } => PeerEventKind::InboundCall { call_id, from },
        SignalMessage::Answer { from, .. } => PeerEventKind::MediaStreamReceived { from },
        SignalMessage::Connect { from } => PeerEventKind::InboundSideChannel { from },
        SignalMessage::Accept { from } => PeerEventKind::SideChannelOpened { peer: from },
        SignalMessage::Data { payload, .. } => PeerEventKind::SideChannelData(payload.into_bytes()),
        SignalMessage::Hangup { .. } => PeerEventKind::MediaClosed,
        SignalMessage::Close { .. } => PeerEventKind::SideChannelClosed,
    };

    if kind.is_link_scoped() && bound_peer != Some(from.as_str()) {
        debug!("Dropping {:?} from unbound peer {}", kind, from);
        return None;
    }
    Some(kind)
}

fn spawn_inbox_listener(
    mut subscriber: async_nats::Subscriber,
    events: EventSink,
    calls: Arc<Mutex<HashMap<String, String>>>,
    peer: BoundPeer,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = subscriber.next().await {
            let signal: SignalMessage = match serde_json::from_slice(&msg.payload) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to parse signal message: {}", e);
                    continue;
                }
            };

            if let SignalMessage::Call { call_id, from } = &signal {
                calls
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(call_id.clone(), from.clone());
            }

            let Some(kind) = signal_event(signal, bound(&peer).as_deref()) else {
                continue;
            };
            if !events.emit(kind) {
                break;
            }
        }
    })
}

struct NatsEndpoint {
    client: NatsClient,
    prefix: String,
    presence_timeout: Duration,
    local_id: String,
    /// Shared with the inbox listener
    peer: BoundPeer,
    /// call id -> caller id
    calls: Arc<Mutex<HashMap<String, String>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NatsEndpoint {
    /// Endpoint for a rejected registration; holds no subscriptions.
    fn detached(transport: &NatsTransport, local_id: String) -> Self {
        Self {
            client: transport.client.clone(),
            prefix: transport.prefix.clone(),
            presence_timeout: transport.presence_timeout,
            local_id,
            peer: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(HashMap::new())),
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn peer(&self) -> Option<String> {
        bound(&self.peer)
    }

    fn set_peer(&self, id: &str) {
        *self.peer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(id.to_string());
    }

    async fn require_present(&self, target: &str) -> Result<()> {
        let subject = format!("{}.presence.{}", self.prefix, target);
        match self
            .client
            .probe(&subject, self.presence_timeout)
            .await
            .map_err(signaling)?
        {
            Some(_) => Ok(()),
            None => Err(SessionError::PeerUnavailable(target.to_string())),
        }
    }

    async fn signal(&self, to: &str, message: &SignalMessage) -> Result<()> {
        let subject = format!("{}.peer.{}", self.prefix, to);
        self.client
            .publish_json(&subject, message)
            .await
            .map_err(signaling)
    }
}

#[async_trait]
impl PeerEndpoint for NatsEndpoint {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    async fn call(&self, target: &str, _audio: &AudioSourceHandle) -> Result<()> {
        self.require_present(target).await?;
        self.set_peer(target);

        let call = SignalMessage::Call {
            call_id: Uuid::new_v4().to_string(),
            from: self.local_id.clone(),
        };
        self.signal(target, &call).await
    }

    async fn connect(&self, target: &str) -> Result<()> {
        self.require_present(target).await?;
        self.set_peer(target);

        let connect = SignalMessage::Connect {
            from: self.local_id.clone(),
        };
        self.signal(target, &connect).await
    }

    async fn answer(&self, call_id: &str, _audio: &AudioSourceHandle) -> Result<()> {
        let caller = self
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(call_id)
            .ok_or_else(|| SessionError::Signaling(format!("unknown call {}", call_id)))?;
        self.set_peer(&caller);

        let answer = SignalMessage::Answer {
            call_id: call_id.to_string(),
            from: self.local_id.clone(),
        };
        self.signal(&caller, &answer).await
    }

    async fn accept_side_channel(&self, from: &str) -> Result<()> {
        self.set_peer(from);

        let accept = SignalMessage::Accept {
            from: self.local_id.clone(),
        };
        self.signal(from, &accept).await
    }

    async fn reject(&self, from: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|_, caller| caller.as_str() != from);

        let hangup = SignalMessage::Hangup {
            from: self.local_id.clone(),
        };
        self.signal(from, &hangup).await?;
        let close = SignalMessage::Close {
            from: self.local_id.clone(),
        };
        self.signal(from, &close).await?;
        info!("Turned away {}", from);
        Ok(())
    }

    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        let peer = self
            .peer()
            .ok_or_else(|| SessionError::SideChannelSend("no peer".to_string()))?;
        let payload = String::from_utf8(payload)
            .map_err(|e| SessionError::SideChannelSend(e.to_string()))?;

        let data = SignalMessage::Data {
            from: self.local_id.clone(),
            payload,
        };
        self.signal(&peer, &data)
            .await
            .map_err(|e| SessionError::SideChannelSend(e.to_string()))
    }

    async fn close_media(&self) -> Result<()> {
        if let Some(peer) = self.peer() {
            let hangup = SignalMessage::Hangup {
                from: self.local_id.clone(),
            };
            self.signal(&peer, &hangup).await?;
        }
        Ok(())
    }

    async fn close_side_channel(&self) -> Result<()> {
        if let Some(peer) = self.peer() {
            let close = SignalMessage::Close {
                from: self.local_id.clone(),
            };
            self.signal(&peer, &close).await?;
        }
        Ok(())
    }

    async fn unregister(&self) -> Result<()> {
        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for task in tasks {
            task.abort();
        }
        if let Err(e) = self.client.flush().await {
            warn!("Failed to flush after unregistering {}: {:#}", self.local_id, e);
        }
        info!("NATS endpoint {} unregistered", self.local_id);
        Ok(())
    }
}
