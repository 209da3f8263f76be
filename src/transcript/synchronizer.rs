use async_trait::async_trait;
use tracing::{debug, warn};

use super::item::{now_millis, ItemIdGenerator, Sender, TranscriptItem};
use super::message::SideChannelMessage;
use crate::error::Result;

/// Outbound half of the side-channel as seen by the synchronizer
#[async_trait]
pub trait SideChannelSink: Send + Sync {
    fn is_open(&self) -> bool;

    async fn send(&self, message: &SideChannelMessage) -> Result<()>;
}

/// What a remote message did to the shared sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Appended,
    Replaced,
    /// Would have reopened an item that is already final
    IgnoredStale,
}

/// Owns the shared, ordered transcript for one session.
///
/// Local fragments continue the last item while it is a pending local
/// utterance; anything else starts a new item. Remote items are matched by id
/// and replaced in place, so re-delivery is idempotent.
#[derive(Debug, Default)]
pub struct TranscriptSynchronizer {
    items: Vec<TranscriptItem>,
    ids: ItemIdGenerator,
}

impl TranscriptSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view for presentation
    pub fn items(&self) -> &[TranscriptItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count_by(&self, sender: Sender) -> usize {
        self.items.iter().filter(|i| i.sender == sender).count()
    }

    /// Merge a local fragment into the sequence without sending it.
    pub fn apply_local(&mut self, text: &str, is_final: bool) -> TranscriptItem {
        let now = now_millis();

        if let Some(last) = self.items.last_mut() {
            if last.is_pending_local() {
                last.text = text.to_string();
                last.is_final = is_final;
                last.timestamp = last.timestamp.max(now);
                return last.clone();
            }
        }

        let item = TranscriptItem {
            id: self.ids.next_id(now),
            sender: Sender::Local,
            text: text.to_string(),
            is_final,
            timestamp: now,
        };
        self.items.push(item.clone());
        item
    }

    /// Merge a local speech fragment and mirror it to the peer.
    ///
    /// A failed send is logged and otherwise ignored; the local sequence keeps
    /// the update and the next fragment carries the current state forward.
    pub async fn ingest_local(
        &mut self,
        text: &str,
        is_final: bool,
        channel: &dyn SideChannelSink,
    ) -> TranscriptItem {
        let item = self.apply_local(text, is_final);
        Self::mirror(SideChannelMessage::Transcript(item.clone()), channel).await;
        item
    }

    /// Append a typed chat line as a final local item and mirror it.
    pub async fn post_chat(&mut self, text: &str, channel: &dyn SideChannelSink) -> TranscriptItem {
        let now = now_millis();
        let item = TranscriptItem {
            id: self.ids.next_id(now),
            sender: Sender::Local,
            text: text.to_string(),
            is_final: true,
            timestamp: now,
        };
        self.items.push(item.clone());
        Self::mirror(SideChannelMessage::Chat(item.clone()), channel).await;
        item
    }

    async fn mirror(message: SideChannelMessage, channel: &dyn SideChannelSink) {
        if !channel.is_open() {
            debug!("Side-channel not open, keeping item {} local", message.item().id);
            return;
        }

        if let Err(e) = channel.send(&message).await {
            warn!("Failed to send {} for item {}: {}", message.kind(), message.item().id, e);
        }
    }

    /// Merge a message received from the peer.
    pub fn ingest_remote(&mut self, message: SideChannelMessage) -> MergeOutcome {
        let mut incoming = message.into_item();
        incoming.sender = Sender::Remote;

        let existing = self
            .items
            .iter_mut()
            .find(|i| i.sender == Sender::Remote && i.id == incoming.id);

        match existing {
            Some(current) => {
                if current.is_final && !incoming.is_final {
                    warn!("Ignoring interim update for finalized item {}", incoming.id);
                    return MergeOutcome::IgnoredStale;
                }
                incoming.timestamp = incoming.timestamp.max(current.timestamp);
                *current = incoming;
                MergeOutcome::Replaced
            }
            None => {
                self.items.push(incoming);
                MergeOutcome::Appended
            }
        }
    }

    /// Decode raw side-channel bytes and merge them.
    pub fn ingest_remote_bytes(&mut self, bytes: &[u8]) -> Result<MergeOutcome> {
        let message = SideChannelMessage::decode(bytes)?;
        Ok(self.ingest_remote(message))
    }
}
