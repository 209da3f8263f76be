use tracing::{info, warn};

use super::engine::{EngineEvent, EngineSink, SpeechEngine, SpeechErrorKind};

/// What the adapter surfaces to the session after handling an engine event
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Fragment { text: String, is_final: bool },
    Status(String),
    CaptioningDisabled(SpeechErrorKind),
}

/// Wraps a recognition engine with a supervised restart policy.
///
/// `should_listen` is only set by `start` and cleared by `stop` or a terminal
/// error. The engine's own `Ended` notification never changes it, so an
/// intentional stop is never undone by a late `Ended`.
pub struct SpeechCaptureAdapter {
    engine: Box<dyn SpeechEngine>,
    sink: EngineSink,
    max_consecutive_restarts: u32,
    should_listen: bool,
    capturing: bool,
    consecutive_restarts: u32,
    disabled: Option<SpeechErrorKind>,
}

impl SpeechCaptureAdapter {
    pub fn new(engine: Box<dyn SpeechEngine>, sink: EngineSink, max_consecutive_restarts: u32) -> Self {
        Self {
            engine,
            sink,
            max_consecutive_restarts,
            should_listen: false,
            capturing: false,
            consecutive_restarts: 0,
            disabled: None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn should_listen(&self) -> bool {
        self.should_listen
    }

    pub fn disabled_reason(&self) -> Option<&SpeechErrorKind> {
        self.disabled.as_ref()
    }

    /// Begin capture. No-op while already capturing or after a terminal error.
    pub async fn start(&mut self) -> Result<(), SpeechErrorKind> {
        if let Some(reason) = &self.disabled {
            return Err(reason.clone());
        }
        if self.capturing {
            return Ok(());
        }

        self.should_listen = true;
        self.launch().await
    }

    /// Halt capture and suppress auto-resume.
    pub async fn stop(&mut self) {
        self.should_listen = false;
        if self.capturing {
            info!("Stopping speech engine {}", self.engine.name());
            self.engine.stop().await;
            self.capturing = false;
        }
    }

    async fn launch(&mut self) -> Result<(), SpeechErrorKind> {
        match self.engine.start(self.sink.clone()).await {
            Ok(()) => {
                info!("Speech engine {} listening", self.engine.name());
                self.capturing = true;
                Ok(())
            }
            Err(kind) => {
                warn!("Failed to start speech engine {}: {}", self.engine.name(), kind);
                if kind.is_terminal() {
                    self.disable(kind.clone());
                }
                Err(kind)
            }
        }
    }

    fn disable(&mut self, kind: SpeechErrorKind) {
        self.should_listen = false;
        self.capturing = false;
        self.disabled = Some(kind);
    }

    /// Handle one engine event.
    pub async fn handle(&mut self, event: EngineEvent) -> Option<CaptureEvent> {
        match event {
            EngineEvent::Result { text, is_final, .. } => {
                if !self.should_listen {
                    return None;
                }
                self.consecutive_restarts = 0;
                Some(CaptureEvent::Fragment { text, is_final })
            }
            EngineEvent::Ended => {
                self.capturing = false;
                if !self.should_listen || self.disabled.is_some() {
                    return None;
                }

                if self.consecutive_restarts >= self.max_consecutive_restarts {
                    warn!(
                        "Speech engine ended {} times without results, giving up",
                        self.consecutive_restarts
                    );
                    self.disable(SpeechErrorKind::RestartLimit);
                    return Some(CaptureEvent::CaptioningDisabled(SpeechErrorKind::RestartLimit));
                }

                self.consecutive_restarts += 1;
                info!("Restarting speech recognition (attempt {})", self.consecutive_restarts);
                match self.launch().await {
                    Ok(()) => None,
                    Err(kind) if kind.is_terminal() => Some(CaptureEvent::CaptioningDisabled(kind)),
                    Err(kind) => Some(CaptureEvent::Status(format!("Speech restart failed: {}", kind))),
                }
            }
            EngineEvent::Error(kind) => {
                if kind.is_terminal() {
                    warn!("Speech recognition disabled: {}", kind);
                    if self.capturing {
                        self.engine.stop().await;
                    }
                    self.disable(kind.clone());
                    Some(CaptureEvent::CaptioningDisabled(kind))
                } else {
                    info!("Transient speech error: {}", kind);
                    Some(CaptureEvent::Status(format!("Speech: {}", kind)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Counters {
        starts: u32,
        stops: u32,
    }

    struct CountingEngine {
        counters: Arc<Mutex<Counters>>,
        fail_with: Option<SpeechErrorKind>,
    }

    #[async_trait]
    impl SpeechEngine for CountingEngine {
        async fn start(&mut self, _sink: EngineSink) -> Result<(), SpeechErrorKind> {
            if let Some(kind) = &self.fail_with {
                return Err(kind.clone());
            }
            self.counters.lock().unwrap().starts += 1;
            Ok(())
        }

        async fn stop(&mut self) {
            self.counters.lock().unwrap().stops += 1;
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn adapter(max_restarts: u32) -> (SpeechCaptureAdapter, Arc<Mutex<Counters>>) {
        let counters = Arc::new(Mutex::new(Counters::default()));
        let engine = CountingEngine {
            counters: Arc::clone(&counters),
            fail_with: None,
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        let adapter = SpeechCaptureAdapter::new(Box::new(engine), EngineSink::new(1, tx), max_restarts);
        (adapter, counters)
    }

    fn result(text: &str, is_final: bool) -> EngineEvent {
        EngineEvent::Result {
            result_index: 0,
            text: text.to_string(),
            is_final,
        }
    }

    #[tokio::test]
    async fn test_start_is_noop_when_capturing() {
        let (mut adapter, counters) = adapter(3);

        adapter.start().await.unwrap();
        adapter.start().await.unwrap();

        assert!(adapter.is_capturing());
        assert_eq!(counters.lock().unwrap().starts, 1);
    }

    #[tokio::test]
    async fn test_ended_resumes_while_listening() {
        let (mut adapter, counters) = adapter(3);
        adapter.start().await.unwrap();

        let event = adapter.handle(EngineEvent::Ended).await;

        assert_eq!(event, None);
        assert!(adapter.is_capturing());
        assert_eq!(counters.lock().unwrap().starts, 2);
    }

    #[tokio::test]
    async fn test_ended_after_stop_does_not_resume() {
        let (mut adapter, counters) = adapter(3);
        adapter.start().await.unwrap();
        adapter.stop().await;

        adapter.handle(EngineEvent::Ended).await;

        assert!(!adapter.is_capturing());
        assert_eq!(counters.lock().unwrap().starts, 1);
        assert_eq!(counters.lock().unwrap().stops, 1);
    }

    #[tokio::test]
    async fn test_results_after_stop_are_dropped() {
        let (mut adapter, _) = adapter(3);
        adapter.start().await.unwrap();
        adapter.stop().await;

        assert_eq!(adapter.handle(result("late", true)).await, None);
    }

    #[tokio::test]
    async fn test_restart_budget_resets_on_results() {
        let (mut adapter, counters) = adapter(1);
        adapter.start().await.unwrap();

        adapter.handle(EngineEvent::Ended).await;
        adapter.handle(result("hello", false)).await;
        adapter.handle(EngineEvent::Ended).await;

        assert!(adapter.disabled_reason().is_none());
        assert_eq!(counters.lock().unwrap().starts, 3);
    }

    #[tokio::test]
    async fn test_restart_budget_exhausted_disables_captioning() {
        let (mut adapter, _) = adapter(1);
        adapter.start().await.unwrap();

        adapter.handle(EngineEvent::Ended).await;
        let event = adapter.handle(EngineEvent::Ended).await;

        assert_eq!(
            event,
            Some(CaptureEvent::CaptioningDisabled(SpeechErrorKind::RestartLimit))
        );
        assert!(!adapter.should_listen());
    }

    #[tokio::test]
    async fn test_no_speech_is_transient() {
        let (mut adapter, _) = adapter(3);
        adapter.start().await.unwrap();

        let event = adapter.handle(EngineEvent::Error(SpeechErrorKind::NoSpeech)).await;

        assert!(matches!(event, Some(CaptureEvent::Status(_))));
        assert!(adapter.should_listen());
        assert!(adapter.disabled_reason().is_none());
    }

    #[tokio::test]
    async fn test_permission_revoked_is_terminal() {
        let (mut adapter, counters) = adapter(3);
        adapter.start().await.unwrap();

        let event = adapter
            .handle(EngineEvent::Error(SpeechErrorKind::PermissionRevoked))
            .await;
        adapter.handle(EngineEvent::Ended).await;

        assert_eq!(
            event,
            Some(CaptureEvent::CaptioningDisabled(SpeechErrorKind::PermissionRevoked))
        );
        assert_eq!(counters.lock().unwrap().starts, 1);
        assert_eq!(
            adapter.start().await,
            Err(SpeechErrorKind::PermissionRevoked)
        );
    }

    #[tokio::test]
    async fn test_unsupported_engine_fails_start() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = CountingEngine {
            counters: Arc::new(Mutex::new(Counters::default())),
            fail_with: Some(SpeechErrorKind::NotSupported),
        };
        let mut adapter = SpeechCaptureAdapter::new(Box::new(engine), EngineSink::new(1, tx), 3);

        assert_eq!(adapter.start().await, Err(SpeechErrorKind::NotSupported));
        assert_eq!(adapter.disabled_reason(), Some(&SpeechErrorKind::NotSupported));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SpeechErrorKind::from_code("not-allowed"), SpeechErrorKind::PermissionRevoked);
        assert_eq!(SpeechErrorKind::from_code("no-speech"), SpeechErrorKind::NoSpeech);
        assert!(!SpeechErrorKind::from_code("aborted").is_terminal());
    }
}
