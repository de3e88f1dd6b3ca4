use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::FreeTierConfig;
use super::dictionary::PhraseDictionary;
use super::language::free_tier_code;
use super::provider::{cancellable, ProviderId, TranslationProvider};
use crate::error::{Result, TranslationError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreeTierResponse {
    response_data: Option<FreeTierData>,
    #[serde(default)]
    response_status: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreeTierData {
    translated_text: String,
    #[serde(rename = "match", default)]
    match_score: f64,
}

impl FreeTierResponse {
    fn is_ok(&self) -> bool {
        match &self.response_status {
            serde_json::Value::Number(n) => n.as_u64() == Some(200),
            serde_json::Value::String(s) => s == "200",
            _ => false,
        }
    }
}

/// Keyless translation backend.
///
/// Every other provider falls back to this one, so it never fails: low
/// quality answers and transport errors are replaced by the local
/// [`PhraseDictionary`]. Only cancellation is reported as an error.
pub struct FreeTierProvider {
    config: FreeTierConfig,
    http: reqwest::Client,
    dictionary: PhraseDictionary,
}

impl FreeTierProvider {
    pub fn new(config: FreeTierConfig, http: reqwest::Client, dictionary: PhraseDictionary) -> Self {
        Self {
            config,
            http,
            dictionary,
        }
    }

    pub fn dictionary(&self) -> &PhraseDictionary {
        &self.dictionary
    }

    async fn request(&self, text: &str, source: &str, target: &str) -> Result<FreeTierData> {
        let url = format!("{}/get", self.config.base_url.trim_end_matches('/'));
        let langpair = format!("{source}|{target}");

        let response = self
            .http
            .get(&url)
            .query(&[("q", text), ("langpair", langpair.as_str())])
            .header("User-Agent", "loqa-subtitles/0.1")
            .send()
            .await
            .map_err(TranslationError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::ProviderError(format!("HTTP {status}")));
        }

        let body: FreeTierResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        match body.response_data {
            Some(data) if body.is_ok() => Ok(data),
            _ => Err(TranslationError::InvalidResponse(format!(
                "unexpected response status {}",
                body.response_status
            ))),
        }
    }
}

#[async_trait]
impl TranslationProvider for FreeTierProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Free
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let source = free_tier_code(from);
        let target = free_tier_code(to);

        if self.config.same_language_short_circuit && source == target {
            return Ok(text.to_string());
        }

        debug!("Free tier request: {} -> {}", source, target);

        match cancellable(cancel, self.request(text, &source, &target)).await {
            Ok(data) if data.match_score >= self.config.low_match_threshold => {
                Ok(data.translated_text)
            }
            Ok(data) => {
                debug!(
                    match_score = data.match_score,
                    "Low quality free tier translation, using local dictionary"
                );
                Ok(self.dictionary.translate(text, from, to))
            }
            Err(TranslationError::Cancelled) => Err(TranslationError::Cancelled),
            Err(e) => {
                warn!("Free tier translation failed, using local dictionary: {}", e);
                Ok(self.dictionary.translate(text, from, to))
            }
        }
    }
}
