use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::engine::{EngineEvent, EngineSink, SpeechEngine, SpeechEngineFactory, SpeechErrorKind};
use crate::nats::{NatsClient, TranscriptMessage};

/// Recognition results published by an external STT service over NATS.
///
/// Only messages whose `session_id` matches the session key are forwarded.
/// When the subscription stream ends the engine reports `Ended`.
pub struct NatsSpeechEngine {
    client: NatsClient,
    subject: String,
    session_key: String,
    listener: Option<JoinHandle<()>>,
}

impl NatsSpeechEngine {
    pub fn new(client: NatsClient, subject: impl Into<String>, session_key: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
            session_key: session_key.into(),
            listener: None,
        }
    }
}

/// A listener counts as running until its task finishes.
fn is_listening(listener: &Option<JoinHandle<()>>) -> bool {
    listener.as_ref().is_some_and(|handle| !handle.is_finished())
}

/// Turn one STT message into a recognizer result for `session_key`.
///
/// `result_index` advances after each final result.
fn transcript_event(
    transcript: TranscriptMessage,
    session_key: &str,
    result_index: &mut u32,
) -> Option<EngineEvent> {
    if transcript.session_id != session_key {
        return None;
    }

    let is_final = !transcript.partial;
    let event = EngineEvent::Result {
        result_index: *result_index,
        text: transcript.text,
        is_final,
    };
    if is_final {
        *result_index += 1;
    }
    Some(event)
}

#[async_trait]
impl SpeechEngine for NatsSpeechEngine {
    async fn start(&mut self, sink: EngineSink) -> Result<(), SpeechErrorKind> {
        if is_listening(&self.listener) {
            return Ok(());
        }
        self.listener = None;

        let mut subscriber = self
            .client
            .subscribe_transcripts(&self.subject)
            .await
            .map_err(|e| {
                error!("Failed to subscribe to transcripts: {:#}", e);
                SpeechErrorKind::Network
            })?;

        let session_key = self.session_key.clone();
        info!("Listening for transcripts of {} on {}", session_key, self.subject);

        self.listener = Some(tokio::spawn(async move {
            let mut result_index = 0u32;

            while let Some(msg) = subscriber.next().await {
                let transcript: TranscriptMessage = match serde_json::from_slice(&msg.payload) {
                    Ok(transcript) => transcript,
                    Err(e) => {
                        error!("Failed to parse transcript message: {}", e);
                        continue;
                    }
                };
                debug!(
                    "Received transcript for {}: {} (partial={}, confidence={:?})",
                    transcript.session_id, transcript.text, transcript.partial, transcript.confidence
                );

                let Some(event) = transcript_event(transcript, &session_key, &mut result_index)
                else {
                    continue;
                };
                if !sink.emit(event) {
                    return;
                }
            }

            sink.emit(EngineEvent::Ended);
        }));

        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            debug!("Stopped transcript listener for {}", self.session_key);
        }
    }

    fn name(&self) -> &str {
        "nats-stt"
    }
}

/// Builds a [`NatsSpeechEngine`] per session
pub struct NatsSpeechFactory {
    client: NatsClient,
    subject: String,
}

impl NatsSpeechFactory {
    pub fn new(client: NatsClient, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

impl SpeechEngineFactory for NatsSpeechFactory {
    fn create(&self, session_key: &str) -> Box<dyn SpeechEngine> {
        Box::new(NatsSpeechEngine::new(
            self.client.clone(),
            self.subject.clone(),
            session_key,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(session_id: &str, text: &str, partial: bool) -> TranscriptMessage {
        TranscriptMessage {
            session_id: session_id.to_string(),
            text: text.to_string(),
            partial,
            timestamp: "2026-10-16T09:00:00Z".to_string(),
            confidence: None,
        }
    }

    #[tokio::test]
    async fn test_finished_listener_allows_restart() {
        let listener = tokio::spawn(async {});
        while !listener.is_finished() {
            tokio::task::yield_now().await;
        }

        assert!(!is_listening(&Some(listener)));
        assert!(!is_listening(&None));
    }

    #[tokio::test]
    async fn test_running_listener_blocks_second_start() {
        let listener = tokio::spawn(std::future::pending::<()>());
        let listener = Some(listener);

        assert!(is_listening(&listener));
        if let Some(handle) = listener {
            handle.abort();
        }
    }

    #[test]
    fn test_other_sessions_are_skipped() {
        let mut index = 0;
        assert!(transcript_event(transcript("guest-9", "hi", false), "4821", &mut index).is_none());
        assert_eq!(index, 0);
    }

    #[test]
    fn test_result_index_advances_on_final() {
        let mut index = 0;

        let interim = transcript_event(transcript("4821", "hello", true), "4821", &mut index);
        assert_eq!(
            interim,
            Some(EngineEvent::Result {
                result_index: 0,
                text: "hello".to_string(),
                is_final: false,
            })
        );

        let last = transcript_event(transcript("4821", "hello team", false), "4821", &mut index);
        assert!(matches!(last, Some(EngineEvent::Result { result_index: 0, is_final: true, .. })));

        let next = transcript_event(transcript("4821", "next", true), "4821", &mut index);
        assert!(matches!(next, Some(EngineEvent::Result { result_index: 1, .. })));
    }
}
