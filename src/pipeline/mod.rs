//! Subtitle session management
//!
//! This module provides the `SubtitleSession` abstraction that manages:
//! - Supervised speech recognition from a pluggable source
//! - Speaker attribution of final utterances
//! - Translation through the shared `PipelineContext`
//! - Typed event publishing for display and history collaborators

mod config;
mod context;
mod events;
mod session;
mod stats;

pub use config::SessionConfig;
pub use context::PipelineContext;
pub use events::{PipelineEvent, Utterance};
pub use session::SubtitleSession;
pub use stats::SessionStats;
