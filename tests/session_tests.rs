use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use loqa_subtitles::recognition::{RecognitionEvent, RecognitionSource, SourceSignal};
use loqa_subtitles::translation::TranslationConfig;
use loqa_subtitles::{
    PipelineContext, PipelineEvent, ProviderId, RateLimiter, RecognitionError, SessionConfig,
    SubtitleSession, SupervisorConfig, SupervisorState, TranslationError, TranslationProvider,
};
use loqa_subtitles::translation::TranslationOutcome;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Translates everything into "Hello".
struct HelloProvider;

#[async_trait]
impl TranslationProvider for HelloProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Free
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn translate(
        &self,
        _text: &str,
        _from: &str,
        _to: &str,
        _cancel: &CancellationToken,
    ) -> Result<String, TranslationError> {
        Ok("Hello".to_string())
    }
}

/// Takes five seconds unless cancelled.
struct SlowProvider;

#[async_trait]
impl TranslationProvider for SlowProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Free
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn translate(
        &self,
        _text: &str,
        _from: &str,
        _to: &str,
        cancel: &CancellationToken,
    ) -> Result<String, TranslationError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TranslationError::Cancelled),
            _ = tokio::time::sleep(Duration::from_secs(5)) => Ok("Hello".to_string()),
        }
    }
}

#[derive(Clone, Default)]
struct Mic {
    sender: Arc<Mutex<Option<mpsc::Sender<SourceSignal>>>>,
    languages: Arc<Mutex<Vec<String>>>,
}

impl Mic {
    async fn say(&self, text: &str, is_final: bool) {
        self.say_with_confidence(text, is_final, 0.9).await;
    }

    async fn say_with_confidence(&self, text: &str, is_final: bool, confidence: f64) {
        let sender = self.sender.lock().unwrap().clone();
        sender
            .expect("microphone is not running")
            .send(SourceSignal::Result(RecognitionEvent {
                text: text.to_string(),
                is_final,
                confidence,
                engine_id: "test".to_string(),
            }))
            .await
            .unwrap();
    }

    fn languages(&self) -> Vec<String> {
        self.languages.lock().unwrap().clone()
    }
}

struct MicSource {
    language: String,
    mic: Mic,
}

#[async_trait]
impl RecognitionSource for MicSource {
    fn name(&self) -> &str {
        "mic"
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<SourceSignal>, RecognitionError> {
        self.mic.languages.lock().unwrap().push(self.language.clone());
        let (tx, rx) = mpsc::channel(32);
        tx.try_send(SourceSignal::Started).unwrap();
        *self.mic.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), RecognitionError> {
        self.mic.sender.lock().unwrap().take();
        Ok(())
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn set_language(&mut self, language: &str) {
        self.language = language.to_string();
    }
}

fn session(config: SessionConfig) -> (SubtitleSession, Mic) {
    session_with(config, Arc::new(HelloProvider))
}

fn session_with(
    config: SessionConfig,
    provider: Arc<dyn TranslationProvider>,
) -> (SubtitleSession, Mic) {
    let translation = TranslationConfig {
        provider: ProviderId::Free,
        target_languages: vec!["zh-tw".into(), "en".into()],
        stats_log_every: 0,
        ..Default::default()
    };
    let limiter = Arc::new(RateLimiter::new(HashMap::new()));
    let ctx = PipelineContext::new(translation, limiter, vec![provider]).unwrap();

    let mic = Mic::default();
    let source = MicSource {
        language: "zh-TW".to_string(),
        mic: mic.clone(),
    };
    (
        SubtitleSession::new(config, Arc::new(ctx), Box::new(source)),
        mic,
    )
}

fn session_config() -> SessionConfig {
    SessionConfig {
        session_id: "standup".to_string(),
        recognition: SupervisorConfig {
            forced_restart_ms: 0,
            watchdog_interval_ms: 3_600_000,
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn next_matching(
    events: &mut broadcast::Receiver<PipelineEvent>,
    pred: impl Fn(&PipelineEvent) -> bool,
) -> PipelineEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("session events closed");
        if pred(&event) {
            return event;
        }
    }
}

async fn wait_listening(events: &mut broadcast::Receiver<PipelineEvent>) {
    next_matching(events, |e| {
        matches!(e, PipelineEvent::SupervisorStatus { status } if status.state == SupervisorState::Listening)
    })
    .await;
}

#[tokio::test]
async fn test_final_utterance_is_attributed_then_translated() {
    let (session, mic) = session(session_config());
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;

    mic.say("你好", true).await;

    let utterance = match next_matching(&mut events, |e| e.kind() != "status").await {
        PipelineEvent::SpeakerAssigned { utterance } => utterance,
        other => panic!("expected speaker assignment first, got {other:?}"),
    };
    assert_eq!(utterance.original_text, "你好");
    let speaker = utterance.speaker.clone().expect("speaker detection is on");
    assert_eq!(speaker.name, "Speaker 1");
    assert!(speaker.is_new);

    let result = match next_matching(&mut events, |e| e.kind() == "translation").await {
        PipelineEvent::TranslationSettled { result } => result,
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(result.request_id, utterance.id);
    assert_eq!(result.text_for("zh-tw"), Some("你好"));
    assert_eq!(result.text_for("en"), Some("Hello"));

    let stats = session.stats().await;
    assert_eq!(stats.utterances, 1);
    assert_eq!(stats.speakers, 1);
    assert_eq!(stats.translation.succeeded, 1);
}

#[tokio::test]
async fn test_interim_text_is_not_translated() {
    let (session, mic) = session(session_config());
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;

    mic.say("hel", false).await;
    mic.say("   ", true).await;
    mic.say("hello", true).await;

    match next_matching(&mut events, |e| e.kind() != "status").await {
        PipelineEvent::InterimText { text, .. } => assert_eq!(text, "hel"),
        other => panic!("expected interim text, got {other:?}"),
    }
    // The blank final result produced nothing.
    match next_matching(&mut events, |e| e.kind() != "status").await {
        PipelineEvent::SpeakerAssigned { utterance } => assert_eq!(utterance.original_text, "hello"),
        other => panic!("expected utterance, got {other:?}"),
    }

    let stats = session.stats().await;
    assert_eq!(stats.interim_events, 1);
    assert_eq!(stats.utterances, 1);
}

#[tokio::test]
async fn test_speaker_detection_can_be_disabled() {
    let (session, mic) = session(SessionConfig {
        speaker_detection: false,
        ..session_config()
    });
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;
    mic.say("good morning", true).await;

    match next_matching(&mut events, |e| e.kind() == "utterance").await {
        PipelineEvent::SpeakerAssigned { utterance } => assert!(utterance.speaker.is_none()),
        other => panic!("unexpected event {other:?}"),
    }
    assert!(session.speakers().await.is_empty());
}

#[tokio::test]
async fn test_target_languages_override() {
    let (session, mic) = session(SessionConfig {
        target_languages: Some(vec!["ja".into()]),
        ..session_config()
    });
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;
    mic.say("你好", true).await;

    match next_matching(&mut events, |e| e.kind() == "translation").await {
        PipelineEvent::TranslationSettled { result } => {
            assert_eq!(result.translations.len(), 1);
            assert_eq!(result.text_for("ja"), Some("Hello"));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_stop_returns_stats_and_is_final() {
    let (session, mic) = session(session_config());
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;
    assert!(session.is_running());

    mic.say("你好", true).await;
    next_matching(&mut events, |e| e.kind() == "translation").await;

    let stats = session.stop().await.unwrap();
    assert!(!stats.is_running);
    assert_eq!(stats.utterances, 1);
    assert_eq!(stats.supervisor_state, SupervisorState::Idle);
    assert!(!session.is_running());

    // A second stop is harmless, a restart is refused.
    assert!(session.stop().await.is_ok());
    assert!(session.start().await.is_err());
}

#[tokio::test]
async fn test_auto_switch_follows_spoken_language() {
    let (session, mic) = session(SessionConfig {
        auto_switch_language: true,
        ..session_config()
    });
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;

    mic.say("good morning everyone", true).await;

    next_matching(&mut events, |e| {
        matches!(e, PipelineEvent::SupervisorStatus { status } if status.state == SupervisorState::Switching)
    })
    .await;
    wait_listening(&mut events).await;

    assert_eq!(mic.languages(), vec!["zh-TW", "en-US"]);
}

#[tokio::test]
async fn test_clear_speakers() {
    let (session, mic) = session(session_config());
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;
    mic.say("你好", true).await;
    next_matching(&mut events, |e| e.kind() == "utterance").await;

    assert_eq!(session.speakers().await.len(), 1);
    session.clear_speakers().await;
    assert!(session.speakers().await.is_empty());
}

#[tokio::test]
async fn test_low_confidence_results_are_dropped() {
    let (session, mic) = session(session_config());
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;

    mic.say_with_confidence("mumble", false, 0.2).await;
    mic.say_with_confidence("hello", false, 0.4).await;
    mic.say_with_confidence("noise", true, 0.5).await;
    mic.say_with_confidence("你好", true, 0.6).await;

    match next_matching(&mut events, |e| e.kind() != "status").await {
        PipelineEvent::InterimText { text, .. } => assert_eq!(text, "hello"),
        other => panic!("expected interim text, got {other:?}"),
    }
    match next_matching(&mut events, |e| e.kind() != "status").await {
        PipelineEvent::SpeakerAssigned { utterance } => assert_eq!(utterance.original_text, "你好"),
        other => panic!("expected utterance, got {other:?}"),
    }

    let stats = session.stats().await;
    assert_eq!(stats.interim_events, 1);
    assert_eq!(stats.utterances, 1);
    assert_eq!(session.speakers().await.len(), 1);
}

#[tokio::test]
async fn test_confidence_thresholds_are_configurable() {
    let (session, mic) = session(SessionConfig {
        min_final_confidence: 0.0,
        min_interim_confidence: 0.0,
        ..session_config()
    });
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;

    mic.say_with_confidence("noise", true, 0.1).await;

    match next_matching(&mut events, |e| e.kind() == "utterance").await {
        PipelineEvent::SpeakerAssigned { utterance } => assert_eq!(utterance.original_text, "noise"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_stop_publishes_cancelled_translations() {
    let (session, mic) = session_with(session_config(), Arc::new(SlowProvider));
    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_listening(&mut events).await;
    mic.say("你好", true).await;

    let utterance = match next_matching(&mut events, |e| e.kind() == "utterance").await {
        PipelineEvent::SpeakerAssigned { utterance } => utterance,
        other => panic!("unexpected event {other:?}"),
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while session.orchestrator().in_flight_len() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("translation never started");

    let stats = session.stop().await.unwrap();
    assert_eq!(stats.translation.cancelled, 1);

    let result = match next_matching(&mut events, |e| e.kind() == "translation").await {
        PipelineEvent::TranslationSettled { result } => result,
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(result.request_id, utterance.id);
    assert_eq!(result.failure(), Some(&TranslationError::Cancelled));
    assert!(matches!(
        result.translations.get("en"),
        Some(TranslationOutcome::Failed { .. })
    ));
}
