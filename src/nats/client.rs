use anyhow::{Context, Result};
use async_nats::Client;
use serde::Serialize;
use tracing::{debug, info};

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

    /// Publish a value as JSON
    pub async fn publish_json<T: Serialize>(&self, subject: String, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        let bytes = payload.len();

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish message")?;

        debug!("Published {} bytes to {}", bytes, subject);

        Ok(())
    }

    /// Subscribe to transcript messages
    pub async fn subscribe_transcripts(&self) -> Result<async_nats::Subscriber> {
        // loqa-core publishes to stt.text.partial and stt.text.final
        // We filter by session_id in the message payload
        let subject = "stt.text.>";

        info!("Subscribing to transcripts on {}", subject);

        let subscriber = self
            .client
            .subscribe(subject)
            .await
            .context("Failed to subscribe to transcripts")?;

        info!("Subscribed to {}", subject);

        Ok(subscriber)
    }
}
