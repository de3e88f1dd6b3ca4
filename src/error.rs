//! Error types for the translation and recognition paths.
//!
//! Library operations return typed errors so the orchestrator and the
//! supervisor can decide between fallback, retry and surfacing. Application
//! wiring (config loading, CLI, HTTP) stays on `anyhow`.

use serde::Serialize;
use thiserror::Error;

use crate::translation::ProviderId;

/// Why a queued request was dropped without being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The queue was full and this was its oldest entry.
    QueueOverflow,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::QueueOverflow => write!(f, "queue overflow"),
        }
    }
}

/// Errors produced while translating a single piece of text.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TranslationError {
    /// The provider has no credentials configured.
    #[error("{0} provider is not configured")]
    NotConfigured(ProviderId),

    /// Credentials were rejected (HTTP 401).
    #[error("authentication failed: {0}")]
    Unauthenticated(String),

    /// The provider itself answered with HTTP 429.
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    /// Local admission control refused the request.
    #[error("{0} request rate exceeded, try again later")]
    RateLimitExceeded(ProviderId),

    /// The account quota is used up.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The request never reached the provider or the connection dropped.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The provider reported an internal failure (HTTP 5xx).
    #[error("server error: {0}")]
    ServerError(String),

    /// Any other non-success response.
    #[error("provider error: {0}")]
    ProviderError(String),

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("skipped: {0}")]
    Skipped(SkipReason),

    #[error("text is empty")]
    EmptyText,

    #[error("request {0} is already pending")]
    DuplicateRequest(String),
}

impl TranslationError {
    /// Errors that end the request outright instead of triggering fallback.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranslationError::Timeout | TranslationError::Cancelled | TranslationError::Skipped(_)
        )
    }

    /// Map a reqwest transport failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TranslationError::NetworkError(format!("request timed out: {err}"))
        } else if err.is_decode() {
            TranslationError::InvalidResponse(err.to_string())
        } else {
            TranslationError::NetworkError(err.to_string())
        }
    }
}

/// Errors produced by the recognition supervisor and its sources.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    /// Microphone or speech service access was refused. Fatal.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unsupported recognition language: {0}")]
    UnsupportedLanguage(String),

    /// The source could not be started or stopped.
    #[error("recognition source error: {0}")]
    Source(String),

    #[error("recognition restart failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("language switch rejected, cooldown has {remaining_ms}ms left")]
    Cooldown { remaining_ms: u64 },

    #[error("supervisor task is no longer running")]
    SupervisorGone,
}

/// A convenience type alias for translation operations.
pub type Result<T> = std::result::Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_rate_limit_exceeded() {
        let err = TranslationError::RateLimitExceeded(ProviderId::Free);
        assert_eq!(err.to_string(), "free request rate exceeded, try again later");
    }

    #[test]
    fn test_display_skipped() {
        let err = TranslationError::Skipped(SkipReason::QueueOverflow);
        assert_eq!(err.to_string(), "skipped: queue overflow");
    }

    #[test]
    fn test_terminal_errors() {
        assert!(TranslationError::Timeout.is_terminal());
        assert!(TranslationError::Cancelled.is_terminal());
        assert!(TranslationError::Skipped(SkipReason::QueueOverflow).is_terminal());
        assert!(!TranslationError::Unauthenticated("bad key".into()).is_terminal());
        assert!(!TranslationError::RateLimitExceeded(ProviderId::Regional).is_terminal());
    }

    #[test]
    fn test_display_retries_exhausted() {
        let err = RecognitionError::RetriesExhausted { attempts: 5 };
        assert_eq!(err.to_string(), "recognition restart failed after 5 attempts");
    }
}
