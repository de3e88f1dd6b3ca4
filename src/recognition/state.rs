use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::source::RecognitionEvent;

/// Lifecycle of a supervised recognition source.
///
/// Restarting and switching are states of the same machine, so at most one
/// recovery or language change runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Idle,
    Starting,
    Listening,
    Restarting,
    Switching,
    Stopping,
    /// Terminal until an explicit start
    Failed,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Starting => "starting",
            SupervisorState::Listening => "listening",
            SupervisorState::Restarting => "restarting",
            SupervisorState::Switching => "switching",
            SupervisorState::Stopping => "stopping",
            SupervisorState::Failed => "failed",
        }
    }

    /// Whether the source is (or is about to be) running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SupervisorState::Starting
                | SupervisorState::Listening
                | SupervisorState::Restarting
                | SupervisorState::Switching
        )
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub state: SupervisorState,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Everything the supervisor emits, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorOutput {
    Event(RecognitionEvent),
    Status(StatusUpdate),
}
