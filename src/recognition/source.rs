use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::RecognitionError;

/// One partial or final hypothesis from a recognition engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionEvent {
    pub text: String,
    pub is_final: bool,
    /// Engine confidence in [0, 1]
    pub confidence: f64,
    /// Which engine produced the event
    pub engine_id: String,
}

/// Error categories a recognition engine can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognitionErrorKind {
    PermissionDenied,
    ServiceNotAllowed,
    NoSpeech,
    Network,
    Aborted,
    AudioCapture,
    UnsupportedLanguage,
    Other,
}

impl RecognitionErrorKind {
    /// Map an engine error code onto a category.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "permission-denied" => RecognitionErrorKind::PermissionDenied,
            "service-not-allowed" => RecognitionErrorKind::ServiceNotAllowed,
            "no-speech" => RecognitionErrorKind::NoSpeech,
            "network" => RecognitionErrorKind::Network,
            "aborted" => RecognitionErrorKind::Aborted,
            "audio-capture" => RecognitionErrorKind::AudioCapture,
            "language-not-supported" | "unsupported-language" => {
                RecognitionErrorKind::UnsupportedLanguage
            }
            _ => RecognitionErrorKind::Other,
        }
    }

    /// Access to the microphone or the service was refused.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RecognitionErrorKind::PermissionDenied | RecognitionErrorKind::ServiceNotAllowed
        )
    }

    /// Benign conditions that need no recovery.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, RecognitionErrorKind::NoSpeech | RecognitionErrorKind::Aborted)
    }
}

/// What a running source reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSignal {
    Started,
    Result(RecognitionEvent),
    Error {
        kind: RecognitionErrorKind,
        message: String,
    },
    Ended,
}

/// A streaming speech recognition engine
///
/// Implementations:
/// - NATS: transcripts published by the STT service
/// - Test doubles driven by a script
#[async_trait]
pub trait RecognitionSource: Send {
    /// Get source name for logging
    fn name(&self) -> &str;

    /// Start recognizing
    ///
    /// Returns a channel receiver carrying the signals of this run. The run
    /// is over once `Ended` arrives or the channel closes.
    async fn start(&mut self) -> Result<mpsc::Receiver<SourceSignal>, RecognitionError>;

    /// Stop recognizing
    async fn stop(&mut self) -> Result<(), RecognitionError>;

    /// Current recognition locale, e.g. "zh-TW"
    fn language(&self) -> &str;

    /// Takes effect on the next `start`.
    fn set_language(&mut self, language: &str);
}

/// Creates a recognition source for each new session.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn create(
        &self,
        session_id: &str,
        language: &str,
    ) -> Result<Box<dyn RecognitionSource>, RecognitionError>;
}
