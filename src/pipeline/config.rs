use serde::{Deserialize, Serialize};

use crate::recognition::SupervisorConfig;
use crate::speaker::SpeakerConfig;

/// Configuration for a subtitle session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "subtitles-2025-10-28-standup")
    pub session_id: String,

    /// Overrides the translation target languages for this session
    pub target_languages: Option<Vec<String>>,

    /// Attribute utterances to speakers
    pub speaker_detection: bool,

    /// Switch the recognition language when the text's script changes
    pub auto_switch_language: bool,

    /// Final results below this confidence are neither attributed nor translated
    pub min_final_confidence: f64,

    /// Interim results below this confidence are not published
    pub min_interim_confidence: f64,

    pub speaker: SpeakerConfig,

    pub recognition: SupervisorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("subtitles-{}", uuid::Uuid::new_v4()),
            target_languages: None,
            speaker_detection: true,
            auto_switch_language: false,
            min_final_confidence: 0.6,
            min_interim_confidence: 0.3,
            speaker: SpeakerConfig::default(),
            recognition: SupervisorConfig::default(),
        }
    }
}
