use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::recognition::StatusUpdate;
use crate::speaker::SpeakerAssignment;
use crate::translation::TranslationResult;

/// A finalized piece of speech
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    /// Correlates the utterance with its translation result
    pub id: String,

    pub timestamp: DateTime<Utc>,

    /// None when speaker detection is disabled
    pub speaker: Option<SpeakerAssignment>,

    pub original_text: String,

    pub confidence: f64,
}

impl Utterance {
    pub fn new(text: impl Into<String>, confidence: f64, speaker: Option<SpeakerAssignment>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            speaker,
            original_text: text.into(),
            confidence,
        }
    }
}

/// Everything a session publishes to display and history collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Emitted as soon as a final utterance is attributed, before translation
    SpeakerAssigned { utterance: Utterance },
    InterimText { text: String, confidence: f64 },
    TranslationSettled { result: TranslationResult },
    SupervisorStatus { status: StatusUpdate },
}

impl PipelineEvent {
    /// Short name used in publish subjects.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::SpeakerAssigned { .. } => "utterance",
            PipelineEvent::InterimText { .. } => "interim",
            PipelineEvent::TranslationSettled { .. } => "translation",
            PipelineEvent::SupervisorStatus { .. } => "status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = PipelineEvent::InterimText {
            text: "hel".to_string(),
            confidence: 0.4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "interim_text");
        assert_eq!(json["text"], "hel");
        assert_eq!(event.kind(), "interim");
    }
}
