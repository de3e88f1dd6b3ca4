use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::ratelimit::RateLimiter;
use crate::translation::{
    FreeTierProvider, PhraseDictionary, PromptBasedProvider, ProviderId, RegionalCloudProvider,
    TranslationConfig, TranslationProvider,
};

/// Everything the translation path needs, passed explicitly to the
/// components that use it.
pub struct PipelineContext {
    config: TranslationConfig,
    rate_limiter: Arc<RateLimiter>,
    providers: HashMap<ProviderId, Arc<dyn TranslationProvider>>,
    free_tier: Arc<dyn TranslationProvider>,
}

impl PipelineContext {
    /// Assemble a context from explicit parts.
    ///
    /// A free-tier provider is mandatory since it is the fallback target of
    /// every other provider.
    pub fn new(
        config: TranslationConfig,
        rate_limiter: Arc<RateLimiter>,
        providers: Vec<Arc<dyn TranslationProvider>>,
    ) -> Result<Self> {
        let providers: HashMap<ProviderId, Arc<dyn TranslationProvider>> =
            providers.into_iter().map(|p| (p.id(), p)).collect();

        let free_tier = providers
            .get(&ProviderId::Free)
            .cloned()
            .context("A free tier translation provider is required")?;

        Ok(Self {
            config,
            rate_limiter,
            providers,
            free_tier,
        })
    }

    /// Build the HTTP providers and rate limiter described by `config`.
    pub fn from_config(config: TranslationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let dictionary = match &config.providers.free.dictionary_path {
            Some(path) => PhraseDictionary::load(path)?,
            None => PhraseDictionary::bundled(),
        };

        let limits = ProviderId::ALL
            .iter()
            .map(|id| (*id, config.rate_limit_for(*id)))
            .collect();
        let rate_limiter = Arc::new(RateLimiter::new(limits));

        let providers: Vec<Arc<dyn TranslationProvider>> = vec![
            Arc::new(RegionalCloudProvider::new(
                config.providers.regional.clone(),
                http.clone(),
            )),
            Arc::new(PromptBasedProvider::new(
                config.providers.prompt.clone(),
                http.clone(),
            )),
            Arc::new(FreeTierProvider::new(
                config.providers.free.clone(),
                http,
                dictionary,
            )),
        ];

        for provider in &providers {
            info!(
                "Translation provider {}: {}",
                provider.id(),
                if provider.is_configured() { "configured" } else { "no credentials" }
            );
        }

        Self::new(config, rate_limiter, providers)
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn provider(&self, id: ProviderId) -> Option<Arc<dyn TranslationProvider>> {
        self.providers.get(&id).cloned()
    }

    pub fn free_tier(&self) -> Arc<dyn TranslationProvider> {
        Arc::clone(&self.free_tier)
    }

    /// The configured provider, or the free tier when it lacks credentials.
    pub fn selected_provider(&self) -> Arc<dyn TranslationProvider> {
        match self.provider(self.config.provider) {
            Some(provider) if provider.is_configured() => provider,
            _ => {
                debug!(
                    "Provider {} unavailable, using free tier",
                    self.config.provider
                );
                self.free_tier()
            }
        }
    }

    /// A configured provider able to detect languages remotely.
    pub fn language_detector(&self) -> Option<Arc<dyn TranslationProvider>> {
        self.provider(ProviderId::Regional)
            .filter(|provider| provider.is_configured())
    }
}
