//! Translation of finalized utterances
//!
//! This module provides:
//! - A provider abstraction with three interchangeable backends
//! - Local language heuristics and a bundled phrase dictionary
//! - A bounded, prioritized orchestrator that settles every request once

pub mod config;
pub mod dictionary;
pub mod free;
pub mod language;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod regional;
pub mod stats;
pub mod types;

pub use config::{FreeTierConfig, PromptConfig, ProvidersConfig, RegionalConfig, TranslationConfig};
pub use dictionary::PhraseDictionary;
pub use free::FreeTierProvider;
pub use orchestrator::{TranslationHandle, TranslationOrchestrator};
pub use prompt::PromptBasedProvider;
pub use provider::{ProviderId, TranslationProvider};
pub use regional::RegionalCloudProvider;
pub use stats::TranslationStatsSnapshot;
pub use types::{Priority, TranslationOutcome, TranslationRequest, TranslationResult};
