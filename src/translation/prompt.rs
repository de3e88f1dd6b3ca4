use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::config::{configured_key, PromptConfig};
use super::language::display_name;
use super::provider::{cancellable, ProviderId, TranslationProvider};
use crate::error::{Result, TranslationError};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

/// Build the instruction sent to the model.
pub fn build_prompt(text: &str, from: &str, to: &str) -> String {
    format!(
        "Translate the following {} text into {}. Keep the tone and meaning of the original \
         and reply with the translation only, without any explanation:\n\n{}",
        display_name(from),
        display_name(to),
        text
    )
}

/// Chat-completion model used as a translator.
pub struct PromptBasedProvider {
    config: PromptConfig,
    http: reqwest::Client,
}

impl PromptBasedProvider {
    pub fn new(config: PromptConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn request(&self, text: &str, from: &str, to: &str) -> Result<String> {
        let api_key = configured_key(&self.config.api_key)
            .ok_or(TranslationError::NotConfigured(ProviderId::Prompt))?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(text, from, to),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
        };

        let response = self
            .http
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await
            .map_err(TranslationError::from_transport)?;

        let status = response.status();
        debug!("Prompt provider response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Prompt provider API error: {} {}", status, body);
            return Err(match status.as_u16() {
                401 => TranslationError::Unauthenticated("API key is invalid, check settings".into()),
                429 => TranslationError::QuotaExceeded("quota used up or too many requests".into()),
                500 => TranslationError::ServerError("provider server error, try again later".into()),
                code => TranslationError::ProviderError(format!("HTTP {code}: {body}")),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content.trim().to_string())
            .ok_or_else(|| TranslationError::InvalidResponse("missing choices".into()))
    }
}

#[async_trait]
impl TranslationProvider for PromptBasedProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Prompt
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
        debug!(
            "Prompt translation request: {} -> {}",
            display_name(from),
            display_name(to)
        );
        cancellable(cancel, self.request(text, from, to)).await
    }
}
