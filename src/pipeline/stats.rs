use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recognition::SupervisorState;
use crate::translation::TranslationStatsSnapshot;

/// Statistics about a subtitle session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Whether the session is currently running
    pub is_running: bool,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of final utterances
    pub utterances: usize,

    /// Number of interim results
    pub interim_events: usize,

    /// Number of distinct speakers detected
    pub speakers: usize,

    pub supervisor_state: SupervisorState,

    pub translation: TranslationStatsSnapshot,
}
