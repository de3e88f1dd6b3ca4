//! Supervised speech recognition
//!
//! A single task owns the recognition source and keeps it alive:
//! - Restarts after unexpected ends and retryable errors, with capped backoff
//! - Watchdog restart when the source goes silent, plus a periodic restart
//! - Language hot-swap with a cooldown

pub mod source;
pub mod state;
pub mod supervisor;

pub use source::{
    RecognitionErrorKind, RecognitionEvent, RecognitionSource, SourceFactory, SourceSignal,
};
pub use state::{StatusUpdate, SupervisorOutput, SupervisorState};
pub use supervisor::{RecognitionSupervisor, SupervisorConfig};
