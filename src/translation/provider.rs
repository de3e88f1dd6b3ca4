use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Translation backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Region-scoped cloud translation API (key + region).
    #[serde(alias = "microsoft", alias = "primary-cloud")]
    Regional,
    /// Chat-completion model driven by a translation prompt.
    #[serde(alias = "openai", alias = "prompt-based")]
    Prompt,
    /// Keyless public endpoint with a local dictionary safety net.
    Free,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Regional, ProviderId::Prompt, ProviderId::Free];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Regional => "regional",
            ProviderId::Prompt => "prompt",
            ProviderId::Free => "free",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend that can translate a piece of text between two languages.
///
/// Implementations must abort their network call when `cancel` fires and
/// report [`TranslationError::Cancelled`](crate::error::TranslationError::Cancelled).
/// Rate limiting is not their concern; the orchestrator admits every call
/// through the shared [`RateLimiter`](crate::ratelimit::RateLimiter) first.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Whether the provider has the credentials it needs.
    fn is_configured(&self) -> bool;

    /// Translate `text` from `from` to `to` (normalized language codes).
    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<String>;

    /// Detect the language of `text`, if the backend supports it.
    async fn detect_language(&self, _text: &str) -> Option<String> {
        None
    }
}

/// Race a provider future against the cancellation token.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(crate::error::TranslationError::Cancelled),
        res = fut => res,
    }
}
