pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod pipeline;
pub mod ratelimit;
pub mod recognition;
pub mod speaker;
pub mod translation;

pub use config::Config;
pub use error::{RecognitionError, SkipReason, TranslationError};
pub use http::{create_router, AppState};
pub use nats::{NatsClient, TranscriptMessage};
pub use pipeline::{
    PipelineContext, PipelineEvent, SessionConfig, SessionStats, SubtitleSession, Utterance,
};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use recognition::{
    RecognitionEvent, RecognitionSource, RecognitionSupervisor, SupervisorConfig, SupervisorState,
};
pub use speaker::{SpeakerClassifier, SpeakerConfig};
pub use translation::{
    ProviderId, TranslationOrchestrator, TranslationProvider, TranslationRequest, TranslationResult,
};
