use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::ProviderId;
use crate::ratelimit::RateLimitConfig;

/// Translation pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Preferred provider; replaced by the free tier when it has no credentials
    pub provider: ProviderId,

    /// Languages every utterance is translated into
    pub target_languages: Vec<String>,

    /// Per-request deadline covering all target languages
    pub request_timeout_ms: u64,

    /// Maximum number of requests talking to providers at once
    pub max_in_flight: usize,

    /// Maximum number of requests waiting for a slot
    pub queue_capacity: usize,

    /// How often stale queue / in-flight entries are swept
    pub sweep_interval_ms: u64,

    /// Texts shorter than this many characters are dispatched first
    pub short_text_chars: usize,

    /// Log a statistics summary every N settled requests (0 = never)
    pub stats_log_every: u64,

    pub providers: ProvidersConfig,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderId::Regional,
            target_languages: vec!["zh-tw".to_string(), "en".to_string()],
            request_timeout_ms: 10_000,
            max_in_flight: 3,
            queue_capacity: 10,
            sweep_interval_ms: 60_000,
            short_text_chars: 50,
            stats_log_every: 10,
            providers: ProvidersConfig::default(),
        }
    }
}

impl TranslationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn rate_limit_for(&self, provider: ProviderId) -> RateLimitConfig {
        match provider {
            ProviderId::Regional => self.providers.regional.rate_limit,
            ProviderId::Prompt => self.providers.prompt.rate_limit,
            ProviderId::Free => self.providers.free.rate_limit,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub regional: RegionalConfig,
    pub prompt: PromptConfig,
    pub free: FreeTierConfig,
}

/// Region-scoped cloud translation service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionalConfig {
    pub api_key: Option<String>,
    pub region: String,
    pub endpoint: String,
    pub rate_limit: RateLimitConfig,
}

impl Default for RegionalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            region: "eastus".to_string(),
            endpoint: "https://api.cognitive.microsofttranslator.com".to_string(),
            rate_limit: RateLimitConfig::default_for(ProviderId::Regional),
        }
    }
}

/// Chat-completion model used as a translator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub rate_limit: RateLimitConfig,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            top_p: 0.9,
            rate_limit: RateLimitConfig::default_for(ProviderId::Prompt),
        }
    }
}

/// Keyless public translation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeTierConfig {
    pub base_url: String,

    /// Return the input unchanged when source and target are the same
    pub same_language_short_circuit: bool,

    /// Provider match scores below this use the local dictionary instead
    pub low_match_threshold: f64,

    /// Optional JSON file replacing the bundled phrase table
    pub dictionary_path: Option<String>,

    pub rate_limit: RateLimitConfig,
}

impl Default for FreeTierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mymemory.translated.net".to_string(),
            same_language_short_circuit: true,
            low_match_threshold: 0.3,
            dictionary_path: None,
            rate_limit: RateLimitConfig::default_for(ProviderId::Free),
        }
    }
}

/// An API key counts as configured only when it is non-blank.
pub(crate) fn configured_key(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}
