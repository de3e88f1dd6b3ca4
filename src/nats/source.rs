use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::NatsClient;
use super::messages::{event_subject, TranscriptMessage};
use crate::error::RecognitionError;
use crate::pipeline::PipelineEvent;
use crate::recognition::{RecognitionSource, SourceFactory, SourceSignal};

const SIGNAL_CHANNEL_CAPACITY: usize = 100;

/// Recognition source fed by the STT service's transcript subjects.
pub struct NatsRecognitionSource {
    client: Arc<NatsClient>,
    session_id: String,
    language: String,
    task: Option<JoinHandle<()>>,
}

impl NatsRecognitionSource {
    pub fn new(client: Arc<NatsClient>, session_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
            language: language.into(),
            task: None,
        }
    }
}

#[async_trait]
impl RecognitionSource for NatsRecognitionSource {
    fn name(&self) -> &str {
        "nats"
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<SourceSignal>, RecognitionError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let mut subscriber = self
            .client
            .subscribe_transcripts()
            .await
            .map_err(|e| RecognitionError::Source(format!("{e:#}")))?;

        let (tx, rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let session_id = self.session_id.clone();

        let task = tokio::spawn(async move {
            if tx.send(SourceSignal::Started).await.is_err() {
                return;
            }
            info!("Transcript receiving task started");

            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<TranscriptMessage>(&msg.payload) {
                    Ok(transcript) => {
                        // Filter by session_id
                        if transcript.session_id != session_id {
                            continue;
                        }
                        if tx.send(SourceSignal::Result(transcript.into_event())).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse transcript message: {}", e);
                    }
                }
            }

            info!("Transcript subscription closed");
            let _ = tx.send(SourceSignal::Ended).await;
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), RecognitionError> {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Transcript receiving task stopped");
        }
        Ok(())
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn set_language(&mut self, language: &str) {
        // The STT service picks its own model; the locale is kept for reporting.
        self.language = language.to_string();
    }
}

/// Hands each new session a source on the shared connection.
pub struct NatsSourceFactory {
    client: Arc<NatsClient>,
}

impl NatsSourceFactory {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceFactory for NatsSourceFactory {
    async fn create(
        &self,
        session_id: &str,
        language: &str,
    ) -> Result<Box<dyn RecognitionSource>, RecognitionError> {
        Ok(Box::new(NatsRecognitionSource::new(
            Arc::clone(&self.client),
            session_id,
            language,
        )))
    }
}

/// Publish every session event to `subtitles.<session>.<kind>`.
pub fn spawn_event_publisher(
    client: Arc<NatsClient>,
    session_id: String,
    mut events: broadcast::Receiver<PipelineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let subject = event_subject(&session_id, event.kind());
                    if let Err(e) = client.publish_json(subject, &event).await {
                        warn!("Failed to publish session event: {:#}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event publisher lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
