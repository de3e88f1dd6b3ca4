//! Local phrase table used as the last-resort translation.
//!
//! This is a safety net, not a translation engine: it substitutes known
//! phrases in place and otherwise tags the text with the target language.
//! It never fails.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::language::normalize_language;

const BUNDLED_PHRASES: &str = include_str!("phrases.json");

/// `{from: {to: {phrase: translation}}}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct PhraseDictionary {
    table: HashMap<String, HashMap<String, HashMap<String, String>>>,
}

impl PhraseDictionary {
    /// The phrase table compiled into the binary.
    pub fn bundled() -> Self {
        // The bundled table is validated by the unit tests below.
        serde_json::from_str(BUNDLED_PHRASES).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse phrase dictionary")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read phrase dictionary: {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Phrases for a language pair, longest first so that longer phrases win
    /// over phrases they contain.
    fn phrases(&self, from: &str, to: &str) -> Vec<(&str, &str)> {
        let Some(pairs) = self
            .table
            .get(&normalize_language(from))
            .and_then(|targets| targets.get(&normalize_language(to)))
        else {
            return Vec::new();
        };

        let mut phrases: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(phrase, translation)| (phrase.as_str(), translation.as_str()))
            .collect();
        phrases.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()).then(a.0.cmp(b.0)));
        phrases
    }

    /// Replace every known phrase; `None` if nothing matched.
    pub fn lookup(&self, text: &str, from: &str, to: &str) -> Option<String> {
        let mut translated = text.to_string();
        for (phrase, translation) in self.phrases(from, to) {
            translated = replace_ignore_ascii_case(&translated, phrase, translation);
        }

        (translated != text).then_some(translated)
    }

    /// Dictionary translation that always yields some text.
    pub fn translate(&self, text: &str, from: &str, to: &str) -> String {
        self.lookup(text, from, to)
            .unwrap_or_else(|| format!("[{}] {}", normalize_language(to), text))
    }
}

/// Replace all occurrences of `needle`, ignoring ASCII case.
///
/// ASCII lowercasing keeps byte offsets unchanged, so matches found in the
/// lowered copy index directly into the original.
fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }

    let lowered = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (start, matched) in lowered.match_indices(&needle) {
        out.push_str(&haystack[last..start]);
        out.push_str(replacement);
        last = start + matched.len();
    }
    out.push_str(&haystack[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_table_parses() {
        let parsed: PhraseDictionary = serde_json::from_str(BUNDLED_PHRASES).unwrap();
        assert!(!parsed.phrases("zh-tw", "en").is_empty());
        assert!(!parsed.phrases("en", "zh-tw").is_empty());
    }

    #[test]
    fn test_lookup_hit() {
        let dict = PhraseDictionary::bundled();
        assert_eq!(dict.translate("你好", "zh-tw", "en"), "Hello");
        assert_eq!(dict.translate("Hello", "en", "zh-tw"), "你好");
    }

    #[test]
    fn test_lookup_normalizes_codes() {
        let dict = PhraseDictionary::bundled();
        assert_eq!(dict.translate("謝謝", "zh", "EN"), "Thank you");
    }

    #[test]
    fn test_miss_is_tagged() {
        let dict = PhraseDictionary::bundled();
        assert_eq!(dict.translate("今天天氣很好", "zh-tw", "en"), "[en] 今天天氣很好");
        assert_eq!(dict.translate("bonjour", "fr", "en"), "[en] bonjour");
    }

    #[test]
    fn test_longest_phrase_wins() {
        let dict = PhraseDictionary::from_json(
            r#"{"en": {"zh-tw": {"thank you": "謝謝", "you": "你"}}}"#,
        )
        .unwrap();
        assert_eq!(dict.translate("Thank you", "en", "zh-tw"), "謝謝");
    }

    #[test]
    fn test_round_trip() {
        let dict = PhraseDictionary::bundled();
        for original in ["你好", "謝謝", "再見"] {
            let english = dict.translate(original, "zh-tw", "en");
            assert_eq!(dict.translate(&english, "en", "zh-tw"), original);
        }
    }

    #[test]
    fn test_replace_ignore_ascii_case() {
        assert_eq!(replace_ignore_ascii_case("Hello hello HELLO", "hello", "hi"), "hi hi hi");
        assert_eq!(replace_ignore_ascii_case("說 hello 了", "HELLO", "你好"), "說 你好 了");
    }
}
