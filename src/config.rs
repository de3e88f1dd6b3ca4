use anyhow::{Context, Result};
use serde::Deserialize;

use crate::pipeline::SessionConfig;
use crate::recognition::SupervisorConfig;
use crate::speaker::SpeakerConfig;
use crate::translation::TranslationConfig;

/// Environment variables with this prefix override file settings, e.g.
/// `LOQA_SUBTITLES__TRANSLATION__PROVIDER=free`.
pub const ENV_PREFIX: &str = "LOQA_SUBTITLES";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub session: SessionDefaults,
    pub translation: TranslationConfig,
    pub speaker: SpeakerConfig,
    pub recognition: SupervisorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-subtitles".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3002,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,

    /// Publish session events to `subtitles.<session>.<kind>`
    pub publish_events: bool,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            publish_events: true,
        }
    }
}

/// Defaults applied to every new session
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Initial recognition locale
    pub recognition_language: String,
    pub speaker_detection: bool,
    pub auto_switch_language: bool,

    /// Final results below this confidence are dropped
    pub min_final_confidence: f64,

    /// Interim results below this confidence are dropped
    pub min_interim_confidence: f64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            recognition_language: "zh-TW".to_string(),
            speaker_detection: true,
            auto_switch_language: false,
            min_final_confidence: 0.6,
            min_interim_confidence: 0.3,
        }
    }
}

impl Config {
    /// Load `path` (extension optional) and apply environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to load configuration from {path}"))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Session settings for `session_id` built from the configured defaults.
    pub fn session_config(&self, session_id: impl Into<String>) -> SessionConfig {
        SessionConfig {
            session_id: session_id.into(),
            target_languages: None,
            speaker_detection: self.session.speaker_detection,
            auto_switch_language: self.session.auto_switch_language,
            min_final_confidence: self.session.min_final_confidence,
            min_interim_confidence: self.session.min_interim_confidence,
            speaker: self.speaker.clone(),
            recognition: self.recognition.clone(),
        }
    }
}
