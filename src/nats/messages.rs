use serde::{Deserialize, Serialize};

use crate::recognition::RecognitionEvent;

/// Engine id stamped on events that arrive over NATS
pub const STT_ENGINE_ID: &str = "loqa-stt";

/// Transcript message received from STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl TranscriptMessage {
    /// Transcripts without a score are treated as certain.
    pub fn into_event(self) -> RecognitionEvent {
        RecognitionEvent {
            text: self.text,
            is_final: !self.partial,
            confidence: self.confidence.map(f64::from).unwrap_or(1.0).clamp(0.0, 1.0),
            engine_id: STT_ENGINE_ID.to_string(),
        }
    }
}

/// Subject a session event is published on, e.g. "subtitles.standup.translation"
pub fn event_subject(session_id: &str, kind: &str) -> String {
    format!("subtitles.{}.{}", session_id, kind)
}
