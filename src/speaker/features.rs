use serde::{Deserialize, Serialize};

const POSITIVE_WORDS: &[&str] = &[
    "好", "棒", "對", "是", "可以", "謝謝", "good", "yes", "great", "thanks", "sure",
];
const NEGATIVE_WORDS: &[&str] = &["不", "沒", "錯", "壞", "no", "bad", "wrong", "sorry", "not"];

/// Marker phrases for one language.
struct StyleMarkers {
    formal: &'static [&'static str],
    casual: &'static [&'static str],
    questioning: &'static [&'static str],
    commanding: &'static [&'static str],
    commanding_suffixes: &'static [&'static str],
}

const CHINESE_MARKERS: StyleMarkers = StyleMarkers {
    formal: &["您", "請", "謝謝您"],
    casual: &["嗯", "呃", "就是"],
    questioning: &["?", "？", "嗎", "呢"],
    commanding: &["請", "要"],
    commanding_suffixes: &["吧"],
};

const ENGLISH_MARKERS: StyleMarkers = StyleMarkers {
    formal: &["please", "would you", "could you", "thank you", "sir", "madam"],
    casual: &["um", "uh", "yeah", "like", "gonna", "kinda"],
    questioning: &["?", "？"],
    commanding: &["must", "need to", "have to", "let's", "make sure"],
    commanding_suffixes: &["!", "now"],
};

/// Coarse lexicon sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// Which script dominates an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguagePreference {
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "en")]
    English,
}

impl LanguagePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguagePreference::Chinese => "zh",
            LanguagePreference::English => "en",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakingStyle {
    pub formal: bool,
    pub casual: bool,
    pub questioning: bool,
    pub commanding: bool,
}

impl SpeakingStyle {
    fn flags(&self) -> [bool; 4] {
        [self.formal, self.casual, self.questioning, self.commanding]
    }

    /// Fraction of flags that agree, in [0, 1].
    pub fn agreement(&self, other: &SpeakingStyle) -> f64 {
        let ours = self.flags();
        let theirs = other.flags();
        let matches = ours.iter().zip(theirs.iter()).filter(|(a, b)| a == b).count();
        matches as f64 / ours.len() as f64
    }

    fn detect(text: &str, language: LanguagePreference) -> Self {
        let markers = match language {
            LanguagePreference::Chinese => &CHINESE_MARKERS,
            LanguagePreference::English => &ENGLISH_MARKERS,
        };
        let lower = text.to_lowercase();
        let trimmed = lower.trim_end();
        let has_any = |set: &[&str]| set.iter().any(|m| lower.contains(m));

        SpeakingStyle {
            formal: has_any(markers.formal),
            casual: has_any(markers.casual),
            questioning: has_any(markers.questioning),
            commanding: has_any(markers.commanding)
                || markers.commanding_suffixes.iter().any(|s| trimmed.ends_with(s)),
        }
    }
}

/// Per-utterance features used for speaker matching.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechFeatures {
    /// Length in characters
    pub text_length: usize,
    pub word_count: usize,
    pub confidence: f64,
    pub cjk_chars: usize,
    pub latin_words: usize,
    pub has_question_mark: bool,
    pub has_exclamation: bool,
    pub language: LanguagePreference,
    pub sentiment: Sentiment,
    pub style: SpeakingStyle,
}

impl SpeechFeatures {
    pub fn extract(text: &str, confidence: f64) -> Self {
        let cjk_chars = text
            .chars()
            .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
            .count();
        let latin_words = text
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|w| !w.is_empty())
            .count();
        let language = if cjk_chars > latin_words {
            LanguagePreference::Chinese
        } else {
            LanguagePreference::English
        };

        SpeechFeatures {
            text_length: text.chars().count(),
            word_count: text.split_whitespace().count().max(1),
            confidence: confidence.clamp(0.0, 1.0),
            cjk_chars,
            latin_words,
            has_question_mark: text.contains('?') || text.contains('？'),
            has_exclamation: text.contains('!') || text.contains('！'),
            language,
            sentiment: sentiment(text),
            style: SpeakingStyle::detect(text, language),
        }
    }
}

/// Lexicon sentiment: whichever marker set has more hits wins.
pub fn sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_chinese_question() {
        let features = SpeechFeatures::extract("請問您今天有空嗎？", 0.9);
        assert_eq!(features.language, LanguagePreference::Chinese);
        assert_eq!(features.text_length, 9);
        assert!(features.has_question_mark);
        assert!(features.style.formal);
        assert!(features.style.questioning);
        assert!(features.style.commanding);
        assert!(!features.style.casual);
    }

    #[test]
    fn test_extract_english_casual() {
        let features = SpeechFeatures::extract("yeah um I think that works", 0.8);
        assert_eq!(features.language, LanguagePreference::English);
        assert_eq!(features.word_count, 6);
        assert_eq!(features.latin_words, 6);
        assert!(features.style.casual);
        assert!(!features.style.questioning);
    }

    #[test]
    fn test_sentiment_lexicon() {
        assert_eq!(sentiment("great, thanks"), Sentiment::Positive);
        assert_eq!(sentiment("that is wrong"), Sentiment::Negative);
        assert_eq!(sentiment("the meeting starts at ten"), Sentiment::Neutral);
    }

    #[test]
    fn test_style_agreement() {
        let a = SpeakingStyle {
            formal: true,
            ..Default::default()
        };
        let b = SpeakingStyle::default();
        assert_eq!(a.agreement(&a), 1.0);
        assert_eq!(a.agreement(&b), 0.75);
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(SpeechFeatures::extract("hi", 1.7).confidence, 1.0);
    }
}
