use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::language::normalize_language;
use super::provider::ProviderId;
use crate::error::TranslationError;

/// Texts shorter than this many characters are dispatched first by default.
pub const DEFAULT_SHORT_TEXT_CHARS: usize = 50;

/// Dispatch priority. `High` sorts before `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
}

impl Priority {
    pub fn for_text(text: &str, short_text_chars: usize) -> Self {
        if text.chars().count() < short_text_chars {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

/// A piece of finalized text waiting to be translated.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationRequest {
    /// Utterance id, or a synthetic id for ad-hoc requests
    pub id: String,
    pub text: String,
    pub target_languages: Vec<String>,
    pub enqueued_at: DateTime<Utc>,
    pub priority: Priority,
}

impl TranslationRequest {
    pub fn new(id: impl Into<String>, text: impl Into<String>, target_languages: Vec<String>) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            priority: Priority::for_text(&text, DEFAULT_SHORT_TEXT_CHARS),
            text,
            target_languages,
            enqueued_at: Utc::now(),
        }
    }

    /// Request with a generated id.
    pub fn adhoc(text: impl Into<String>, target_languages: Vec<String>) -> Self {
        Self::new(format!("adhoc-{}", uuid::Uuid::new_v4()), text, target_languages)
    }

    /// Normalized target languages, duplicates removed, order kept.
    pub fn normalized_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = Vec::with_capacity(self.target_languages.len());
        for lang in &self.target_languages {
            let lang = normalize_language(lang);
            if !targets.contains(&lang) {
                targets.push(lang);
            }
        }
        targets
    }
}

/// Result for one target language.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranslationOutcome {
    Translated {
        text: String,
    },
    /// Still carries displayable text so subtitles never go blank.
    Failed {
        reason: TranslationError,
        text: String,
    },
}

impl TranslationOutcome {
    pub fn failed(reason: TranslationError, original: &str) -> Self {
        let text = format!("[translation failed: {reason}] {original}");
        TranslationOutcome::Failed { reason, text }
    }

    pub fn display_text(&self) -> &str {
        match self {
            TranslationOutcome::Translated { text } | TranslationOutcome::Failed { text, .. } => text,
        }
    }

    pub fn is_translated(&self) -> bool {
        matches!(self, TranslationOutcome::Translated { .. })
    }
}

/// Settled translation of one request: one outcome per target language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    pub request_id: String,
    pub original_text: String,
    pub detected_language: String,
    /// Provider that was selected for this request
    pub provider: Option<ProviderId>,
    pub translations: BTreeMap<String, TranslationOutcome>,
    pub settled_at: DateTime<Utc>,
}

impl TranslationResult {
    /// A result where every target language failed for the same reason.
    pub fn failed_all(request: &TranslationRequest, reason: TranslationError) -> Self {
        let translations = request
            .normalized_targets()
            .into_iter()
            .map(|lang| (lang, TranslationOutcome::failed(reason.clone(), &request.text)))
            .collect();

        Self {
            request_id: request.id.clone(),
            original_text: request.text.clone(),
            detected_language: "unknown".to_string(),
            provider: None,
            translations,
            settled_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.translations.values().all(TranslationOutcome::is_translated)
    }

    /// The error shared by every language, if the request failed as a whole.
    pub fn failure(&self) -> Option<&TranslationError> {
        let mut reasons = self.translations.values().map(|outcome| match outcome {
            TranslationOutcome::Failed { reason, .. } => Some(reason),
            TranslationOutcome::Translated { .. } => None,
        });
        let first = reasons.next()??;
        reasons.all(|r| r == Some(first)).then_some(first)
    }

    pub fn text_for(&self, lang: &str) -> Option<&str> {
        self.translations
            .get(&normalize_language(lang))
            .map(TranslationOutcome::display_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkipReason;

    #[test]
    fn test_priority_for_text() {
        assert_eq!(Priority::for_text("short", 50), Priority::High);
        assert_eq!(Priority::for_text(&"x".repeat(50), 50), Priority::Normal);
        assert!(Priority::High < Priority::Normal);
    }

    #[test]
    fn test_failed_outcome_keeps_original_text() {
        let outcome = TranslationOutcome::failed(TranslationError::Timeout, "你好");
        assert_eq!(outcome.display_text(), "[translation failed: timeout] 你好");
        assert!(!outcome.is_translated());
    }

    #[test]
    fn test_failed_all_covers_every_language() {
        let request = TranslationRequest::new("r1", "hello", vec!["en".into(), "zh".into(), "zh-tw".into()]);
        let result =
            TranslationResult::failed_all(&request, TranslationError::Skipped(SkipReason::QueueOverflow));

        assert_eq!(result.translations.len(), 2);
        assert_eq!(
            result.failure(),
            Some(&TranslationError::Skipped(SkipReason::QueueOverflow))
        );
        assert_eq!(
            result.text_for("zh-TW"),
            Some("[translation failed: skipped: queue overflow] hello")
        );
    }
}
