use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::config::{configured_key, RegionalConfig};
use super::provider::{cancellable, ProviderId, TranslationProvider};
use crate::error::{Result, TranslationError};

#[derive(Debug, Deserialize)]
struct TranslateItem {
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
struct TranslatedText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct DetectItem {
    language: String,
}

/// Script-qualified codes expected by the regional API.
fn regional_code(code: &str) -> String {
    match code.trim().to_ascii_lowercase().as_str() {
        "zh-tw" | "zh-hant" => "zh-Hant".to_string(),
        "zh" | "zh-cn" | "zh-hans" => "zh-Hans".to_string(),
        other => other.to_string(),
    }
}

/// Cloud translation API scoped to a subscription key and region.
pub struct RegionalCloudProvider {
    config: RegionalConfig,
    http: reqwest::Client,
}

impl RegionalCloudProvider {
    pub fn new(config: RegionalConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<&str> {
        configured_key(&self.config.api_key).ok_or(TranslationError::NotConfigured(ProviderId::Regional))
    }

    async fn request(&self, text: &str, from: &str, to: &str) -> Result<String> {
        let api_key = self.api_key()?;
        let from = regional_code(from);
        let to = regional_code(to);

        let response = self
            .http
            .post(self.endpoint("translate"))
            .query(&[
                ("api-version", "3.0"),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ])
            .header("Ocp-Apim-Subscription-Key", api_key)
            .header("Ocp-Apim-Subscription-Region", self.config.region.as_str())
            .json(&serde_json::json!([{ "text": text }]))
            .send()
            .await
            .map_err(TranslationError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Regional translation API error: {} {}", status, body);
            return Err(match status.as_u16() {
                401 => TranslationError::Unauthenticated("API key is invalid or expired".into()),
                429 => TranslationError::RateLimited("too many requests, try again later".into()),
                code => TranslationError::ProviderError(format!("HTTP {code}")),
            });
        }

        let items: Vec<TranslateItem> = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        items
            .into_iter()
            .next()
            .and_then(|item| item.translations.into_iter().next())
            .map(|t| t.text)
            .ok_or_else(|| TranslationError::InvalidResponse("missing translations".into()))
    }
}

#[async_trait]
impl TranslationProvider for RegionalCloudProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Regional
    }

    fn is_configured(&self) -> bool {
        configured_key(&self.config.api_key).is_some()
    }

    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        debug!("Regional translation request: {} -> {}", from, to);
        cancellable(cancel, self.request(text, from, to)).await
    }

    async fn detect_language(&self, text: &str) -> Option<String> {
        let api_key = self.api_key().ok()?;

        let response = self
            .http
            .post(self.endpoint("detect"))
            .query(&[("api-version", "3.0")])
            .header("Ocp-Apim-Subscription-Key", api_key)
            .header("Ocp-Apim-Subscription-Region", self.config.region.as_str())
            .json(&serde_json::json!([{ "text": text }]))
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Language detection failed: HTTP {}", r.status());
                return None;
            }
            Err(e) => {
                warn!("Language detection failed: {}", e);
                return None;
            }
        };

        match response.json::<Vec<DetectItem>>().await {
            Ok(items) => items.into_iter().next().map(|item| item.language),
            Err(e) => {
                warn!("Language detection returned an unexpected body: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regional_codes() {
        assert_eq!(regional_code("zh-tw"), "zh-Hant");
        assert_eq!(regional_code("zh-CN"), "zh-Hans");
        assert_eq!(regional_code("en"), "en");
    }
}
