use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::context::PipelineContext;
use super::events::{PipelineEvent, Utterance};
use super::stats::SessionStats;
use crate::error::RecognitionError;
use crate::recognition::{
    RecognitionEvent, RecognitionSource, RecognitionSupervisor, SupervisorOutput, SupervisorState,
};
use crate::speaker::{SpeakerClassifier, SpeakerStats};
use crate::translation::language::recognition_locale_for;
use crate::translation::{TranslationOrchestrator, TranslationRequest};

const EVENT_CHANNEL_CAPACITY: usize = 512;

/// How long `stop` waits for cancelled translations to settle
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A live subtitle session: recognition, speaker attribution and translation
/// for one audio source.
pub struct SubtitleSession {
    /// Session configuration
    config: SessionConfig,

    /// Languages every utterance is translated into
    target_languages: Vec<String>,

    orchestrator: TranslationOrchestrator,

    supervisor: Arc<RecognitionSupervisor>,

    /// Taken by the consumer task on start
    supervisor_output: Mutex<Option<mpsc::Receiver<SupervisorOutput>>>,

    /// Mutated only by the consumer task
    classifier: Arc<Mutex<SpeakerClassifier>>,

    events: broadcast::Sender<PipelineEvent>,

    /// When the session was created
    started_at: DateTime<Utc>,

    /// Whether the session is currently running
    is_running: Arc<AtomicBool>,

    utterances: Arc<AtomicUsize>,
    interim_events: Arc<AtomicUsize>,

    /// Consumer and maintenance tasks
    tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Forwards settled translations; drained rather than aborted on stop
    forwarder: Mutex<Option<JoinHandle<()>>>,

    forwarder_shutdown: CancellationToken,
}

impl SubtitleSession {
    /// Create a new session. Must be called from within a Tokio runtime.
    pub fn new(
        config: SessionConfig,
        ctx: Arc<PipelineContext>,
        source: Box<dyn RecognitionSource>,
    ) -> Self {
        info!("Creating subtitle session: {}", config.session_id);

        let target_languages = config
            .target_languages
            .clone()
            .unwrap_or_else(|| ctx.config().target_languages.clone());
        let orchestrator = TranslationOrchestrator::new(ctx);
        let (supervisor, output) = RecognitionSupervisor::spawn(source, config.recognition.clone());
        let classifier = SpeakerClassifier::new(config.speaker.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            target_languages,
            orchestrator,
            supervisor: Arc::new(supervisor),
            supervisor_output: Mutex::new(Some(output)),
            classifier: Arc::new(Mutex::new(classifier)),
            events,
            started_at: Utc::now(),
            is_running: Arc::new(AtomicBool::new(false)),
            utterances: Arc::new(AtomicUsize::new(0)),
            interim_events: Arc::new(AtomicUsize::new(0)),
            tasks: Mutex::new(Vec::new()),
            forwarder: Mutex::new(None),
            forwarder_shutdown: CancellationToken::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn orchestrator(&self) -> &TranslationOrchestrator {
        &self.orchestrator
    }

    pub fn supervisor_state(&self) -> SupervisorState {
        self.supervisor.state()
    }

    /// Receive every event this session publishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Start recognition and the processing tasks.
    pub async fn start(&self) -> Result<()> {
        if self.is_running.load(Ordering::SeqCst) {
            warn!("Session already started");
            return Ok(());
        }

        let Some(output) = self.supervisor_output.lock().await.take() else {
            bail!("Session {} has already been stopped", self.config.session_id);
        };

        info!("Starting subtitle session: {}", self.config.session_id);
        self.is_running.store(true, Ordering::SeqCst);

        *self.forwarder.lock().await = Some(self.spawn_translation_forwarder());
        let consumer = self.spawn_consumer(output);
        let maintenance = self.orchestrator.spawn_maintenance();
        self.tasks.lock().await.extend([consumer, maintenance]);

        if let Err(e) = self.supervisor.start().await {
            error!("Failed to start recognition: {}", e);
            self.is_running.store(false, Ordering::SeqCst);
            self.abort_tasks().await;
            return Err(e.into());
        }

        info!("Subtitle session started successfully");
        Ok(())
    }

    /// Stop recognition, cancel outstanding translations and return final
    /// statistics. A stopped session cannot be started again.
    pub async fn stop(&self) -> Result<SessionStats> {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            warn!("Session not running");
            return Ok(self.stats().await);
        }

        info!("Stopping subtitle session: {}", self.config.session_id);

        if let Err(e) = self.supervisor.stop().await {
            warn!("Failed to stop recognition: {}", e);
        }

        let cancelled = self.orchestrator.cancel_all();
        if cancelled > 0 {
            info!("Cancelled {} outstanding translations", cancelled);
            if !self.orchestrator.wait_idle(DRAIN_TIMEOUT).await {
                warn!("Translations still outstanding after {:?}", DRAIN_TIMEOUT);
            }
        }

        self.abort_tasks().await;

        info!("Subtitle session stopped successfully");
        Ok(self.stats().await)
    }

    /// Abort the consumer and maintenance tasks, then let the forwarder
    /// publish whatever has already settled before it exits.
    async fn abort_tasks(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        self.forwarder_shutdown.cancel();
        if let Some(forwarder) = self.forwarder.lock().await.take() {
            if let Err(e) = forwarder.await {
                warn!("Translation forwarder ended abnormally: {}", e);
            }
        }
    }

    /// Get current session statistics
    pub async fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        let speakers = self.classifier.lock().await.speakers().len();

        SessionStats {
            session_id: self.config.session_id.clone(),
            is_running: self.is_running.load(Ordering::SeqCst),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            utterances: self.utterances.load(Ordering::SeqCst),
            interim_events: self.interim_events.load(Ordering::SeqCst),
            speakers,
            supervisor_state: self.supervisor.state(),
            translation: self.orchestrator.stats(),
        }
    }

    pub async fn speakers(&self) -> Vec<SpeakerStats> {
        self.classifier.lock().await.stats()
    }

    pub async fn clear_speakers(&self) {
        self.classifier.lock().await.clear();
    }

    pub async fn switch_language(&self, language: &str) -> std::result::Result<(), RecognitionError> {
        self.supervisor.switch_language(language).await
    }

    fn spawn_translation_forwarder(&self) -> JoinHandle<()> {
        let mut results = self.orchestrator.subscribe();
        let events = self.events.clone();
        let shutdown = self.forwarder_shutdown.clone();

        tokio::spawn(async move {
            debug!("Translation forwarder started");
            loop {
                // Buffered results win over shutdown so nothing settled is lost.
                let received = tokio::select! {
                    biased;
                    received = results.recv() => received,
                    _ = shutdown.cancelled() => break,
                };
                match received {
                    Ok(result) => {
                        let _ = events.send(PipelineEvent::TranslationSettled { result });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Translation forwarder lagged, {} results dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Translation forwarder stopped");
        })
    }

    /// Process supervisor output strictly in arrival order.
    fn spawn_consumer(&self, mut output: mpsc::Receiver<SupervisorOutput>) -> JoinHandle<()> {
        let consumer = Consumer {
            events: self.events.clone(),
            orchestrator: self.orchestrator.clone(),
            classifier: Arc::clone(&self.classifier),
            supervisor: Arc::clone(&self.supervisor),
            target_languages: self.target_languages.clone(),
            speaker_detection: self.config.speaker_detection,
            min_final_confidence: self.config.min_final_confidence,
            min_interim_confidence: self.config.min_interim_confidence,
            auto_switch_language: self.config.auto_switch_language,
            utterances: Arc::clone(&self.utterances),
            interim_events: Arc::clone(&self.interim_events),
        };

        tokio::spawn(async move {
            info!("Recognition consumer started");
            while let Some(item) = output.recv().await {
                match item {
                    SupervisorOutput::Status(status) => {
                        consumer.emit(PipelineEvent::SupervisorStatus { status });
                    }
                    SupervisorOutput::Event(event) => consumer.handle_event(event).await,
                }
            }
            info!("Recognition consumer stopped");
        })
    }
}

impl Drop for SubtitleSession {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
        if let Some(forwarder) = self.forwarder.get_mut().take() {
            forwarder.abort();
        }
    }
}

struct Consumer {
    events: broadcast::Sender<PipelineEvent>,
    orchestrator: TranslationOrchestrator,
    classifier: Arc<Mutex<SpeakerClassifier>>,
    supervisor: Arc<RecognitionSupervisor>,
    target_languages: Vec<String>,
    speaker_detection: bool,
    min_final_confidence: f64,
    min_interim_confidence: f64,
    auto_switch_language: bool,
    utterances: Arc<AtomicUsize>,
    interim_events: Arc<AtomicUsize>,
}

impl Consumer {
    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn handle_event(&self, event: RecognitionEvent) {
        if !event.is_final {
            if event.confidence < self.min_interim_confidence {
                debug!(confidence = event.confidence, "Dropping low-confidence interim text");
                return;
            }
            self.interim_events.fetch_add(1, Ordering::SeqCst);
            self.emit(PipelineEvent::InterimText {
                text: event.text,
                confidence: event.confidence,
            });
            return;
        }

        let text = event.text.trim();
        if text.is_empty() {
            return;
        }
        if event.confidence < self.min_final_confidence {
            debug!(
                confidence = event.confidence,
                "Dropping low-confidence final result: {}", text
            );
            return;
        }

        let speaker = if self.speaker_detection {
            Some(self.classifier.lock().await.observe(text, event.confidence))
        } else {
            None
        };

        let utterance = Utterance::new(text, event.confidence, speaker);
        self.utterances.fetch_add(1, Ordering::SeqCst);
        debug!(utterance_id = %utterance.id, "Final utterance: {}", text);

        let request =
            TranslationRequest::new(utterance.id.clone(), text, self.target_languages.clone());
        self.emit(PipelineEvent::SpeakerAssigned { utterance });

        if let Err(e) = self.orchestrator.submit(request) {
            warn!("Translation request rejected: {}", e);
        }

        if self.auto_switch_language {
            self.maybe_switch_language(text);
        }
    }

    /// Runs detached: the supervisor may be waiting on this consumer to
    /// drain its output.
    fn maybe_switch_language(&self, text: &str) {
        let Some(locale) = recognition_locale_for(text) else {
            return;
        };
        let supervisor = Arc::clone(&self.supervisor);

        tokio::spawn(async move {
            match supervisor.language().await {
                Ok(current) if current.eq_ignore_ascii_case(locale) => {}
                Ok(current) => {
                    info!("Detected {} speech while recognizing {}", locale, current);
                    if let Err(e) = supervisor.switch_language(locale).await {
                        debug!("Automatic language switch skipped: {}", e);
                    }
                }
                Err(e) => debug!("Could not query recognition language: {}", e),
            }
        });
    }
}
