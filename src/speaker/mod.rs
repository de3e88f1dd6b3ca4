//! Speaker attribution for finalized utterances
//!
//! Speakers are clustered online from cheap text features:
//! - Utterance length, word count and recognition confidence
//! - Dominant script (CJK vs Latin)
//! - Lexicon sentiment and speaking-style markers

pub mod classifier;
pub mod features;

pub use classifier::{
    Speaker, SpeakerAssignment, SpeakerClassifier, SpeakerConfig, SpeakerProfile, SpeakerStats,
};
pub use features::{LanguagePreference, Sentiment, SpeakingStyle, SpeechFeatures};
