use anyhow::{Context, Result};
use async_nats::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Thin wrapper over a NATS connection shared by signaling and speech
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Publish a JSON-encoded message
    pub async fn publish_json<T: Serialize>(&self, subject: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", subject))?;

        debug!("Published to {}", subject);
        Ok(())
    }

    /// Send a request and wait up to `timeout` for a reply.
    ///
    /// `Ok(None)` means nobody answered.
    pub async fn probe(&self, subject: &str, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let request = self.client.request(subject.to_string(), Vec::<u8>::new().into());

        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(reply)) => Ok(Some(reply.payload.to_vec())),
            Ok(Err(e)) => {
                debug!("No responder on {}: {}", subject, e);
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        info!("Subscribed to {}", subject);
        Ok(subscriber)
    }

    /// Subscribe to transcript messages
    pub async fn subscribe_transcripts(&self, subject: &str) -> Result<async_nats::Subscriber> {
        // loqa-core publishes to stt.text.partial and stt.text.final;
        // callers filter by session_id in the payload
        info!("Subscribing to transcripts on {}", subject);
        self.subscribe(subject).await
    }

    /// Flush pending publishes
    pub async fn flush(&self) -> Result<()> {
        self.client.flush().await.context("Failed to flush NATS connection")
    }
}
