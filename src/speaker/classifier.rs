use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use super::features::{LanguagePreference, Sentiment, SpeakingStyle, SpeechFeatures};

const LANGUAGE_BONUS: f64 = 0.5;

/// Speaker clustering thresholds and presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerConfig {
    /// Silence longer than this may mean someone else is talking
    pub change_threshold_ms: u64,

    /// Score above which the current speaker is kept
    pub keep_threshold: f64,

    /// Score above which another known speaker is switched to
    pub switch_threshold: f64,

    /// New speakers are named "<prefix> <n>"
    pub name_prefix: String,

    pub palette: Vec<String>,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            change_threshold_ms: 2000,
            keep_threshold: 0.7,
            switch_threshold: 0.6,
            name_prefix: "Speaker".to_string(),
            palette: [
                "#3498db", "#e74c3c", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#34495e",
                "#e67e22",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }
}

impl SpeakerConfig {
    pub fn change_threshold(&self) -> Duration {
        Duration::from_millis(self.change_threshold_ms)
    }
}

/// Running feature averages for one speaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerProfile {
    pub avg_confidence: f64,
    pub avg_text_length: f64,
    pub avg_word_count: f64,
    pub preferred_language: LanguagePreference,
    pub style: SpeakingStyle,
    pub sentiment: Sentiment,
}

impl SpeakerProfile {
    fn from_features(features: &SpeechFeatures) -> Self {
        Self {
            avg_confidence: features.confidence,
            avg_text_length: features.text_length as f64,
            avg_word_count: features.word_count as f64,
            preferred_language: features.language,
            style: features.style,
            sentiment: features.sentiment,
        }
    }

    /// Similarity of an utterance to this profile, in [0, 1].
    pub fn score(&self, features: &SpeechFeatures) -> f64 {
        let confidence = (1.0 - (features.confidence - self.avg_confidence).abs()).max(0.0);

        let length = features.text_length as f64;
        let longest = length.max(self.avg_text_length);
        let length = if longest > 0.0 {
            (1.0 - (length - self.avg_text_length).abs() / longest).max(0.0)
        } else {
            1.0
        };

        let language = if features.language == self.preferred_language {
            LANGUAGE_BONUS
        } else {
            0.0
        };

        let style = features.style.agreement(&self.style);

        (confidence + length + language + style) / 4.0
    }

    fn update(&mut self, features: &SpeechFeatures, count: u64) {
        let n = count as f64;
        self.avg_confidence = (self.avg_confidence * n + features.confidence) / (n + 1.0);
        self.avg_text_length = (self.avg_text_length * n + features.text_length as f64) / (n + 1.0);
        self.avg_word_count = (self.avg_word_count * n + features.word_count as f64) / (n + 1.0);
        self.style = features.style;
        self.sentiment = features.sentiment;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Speaker {
    pub id: String,
    pub name: String,
    pub color: String,
    pub profile: SpeakerProfile,
    pub speech_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Who an utterance was attributed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerAssignment {
    pub speaker_id: String,
    pub name: String,
    pub color: String,
    /// A new speaker was created for this utterance
    pub is_new: bool,
    /// The current speaker changed with this utterance
    pub switched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakerStats {
    pub id: String,
    pub name: String,
    pub speech_count: u64,
    /// Fraction of all utterances attributed to this speaker
    pub share: f64,
    pub active_duration_ms: i64,
    pub preferred_language: LanguagePreference,
    pub avg_confidence: f64,
    pub color: String,
}

/// Online greedy clustering of utterances into speakers.
///
/// Past assignments are never revisited.
pub struct SpeakerClassifier {
    config: SpeakerConfig,
    speakers: Vec<Speaker>,
    current: Option<usize>,
    last_speech: Option<Instant>,
}

impl SpeakerClassifier {
    pub fn new(config: SpeakerConfig) -> Self {
        Self {
            config,
            speakers: Vec::new(),
            current: None,
            last_speech: None,
        }
    }

    /// Classify an utterance, measuring the silence gap from the previous call.
    pub fn observe(&mut self, text: &str, confidence: f64) -> SpeakerAssignment {
        let now = Instant::now();
        let since_last = self
            .last_speech
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_speech = Some(now);
        self.classify(text, confidence, since_last)
    }

    /// Classify an utterance given the silence gap before it.
    pub fn classify(&mut self, text: &str, confidence: f64, since_last: Duration) -> SpeakerAssignment {
        let features = SpeechFeatures::extract(text, confidence);
        let possible_change = since_last > self.config.change_threshold();

        let Some(current) = self.current else {
            return self.create_speaker(&features);
        };

        let score = self.speakers[current].profile.score(&features);
        debug!(score, possible_change, "Scored utterance against current speaker");

        if score > self.config.keep_threshold && !possible_change {
            return self.assign(current, &features, false);
        }

        if possible_change {
            let best = self
                .speakers
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != current)
                .map(|(idx, speaker)| (idx, speaker.profile.score(&features)))
                .filter(|(_, score)| *score > self.config.switch_threshold)
                .fold(None, |best: Option<(usize, f64)>, candidate| match best {
                    Some((_, best_score)) if best_score >= candidate.1 => best,
                    _ => Some(candidate),
                });

            return match best {
                Some((idx, score)) => {
                    info!(
                        "Switched to known speaker: {} (score {:.2})",
                        self.speakers[idx].name, score
                    );
                    self.current = Some(idx);
                    self.assign(idx, &features, true)
                }
                None => self.create_speaker(&features),
            };
        }

        self.assign(current, &features, false)
    }

    fn assign(&mut self, idx: usize, features: &SpeechFeatures, switched: bool) -> SpeakerAssignment {
        let speaker = &mut self.speakers[idx];
        speaker.profile.update(features, speaker.speech_count);
        speaker.speech_count += 1;
        speaker.last_seen = Utc::now();

        SpeakerAssignment {
            speaker_id: speaker.id.clone(),
            name: speaker.name.clone(),
            color: speaker.color.clone(),
            is_new: false,
            switched,
        }
    }

    fn create_speaker(&mut self, features: &SpeechFeatures) -> SpeakerAssignment {
        let index = self.speakers.len();
        let color = if self.config.palette.is_empty() {
            String::new()
        } else {
            self.config.palette[index % self.config.palette.len()].clone()
        };
        let now = Utc::now();

        let speaker = Speaker {
            id: uuid::Uuid::new_v4().to_string(),
            name: format!("{} {}", self.config.name_prefix, index + 1),
            color,
            profile: SpeakerProfile::from_features(features),
            speech_count: 1,
            first_seen: now,
            last_seen: now,
        };
        info!("New speaker detected: {}", speaker.name);

        let assignment = SpeakerAssignment {
            speaker_id: speaker.id.clone(),
            name: speaker.name.clone(),
            color: speaker.color.clone(),
            is_new: true,
            switched: self.current.is_some(),
        };

        self.speakers.push(speaker);
        self.current = Some(index);
        assignment
    }

    /// Forget every speaker and reset the silence clock.
    pub fn clear(&mut self) {
        info!("Clearing {} speakers", self.speakers.len());
        self.speakers.clear();
        self.current = None;
        self.last_speech = None;
    }

    pub fn current(&self) -> Option<&Speaker> {
        self.current.map(|idx| &self.speakers[idx])
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn stats(&self) -> Vec<SpeakerStats> {
        let total: u64 = self.speakers.iter().map(|s| s.speech_count).sum();

        self.speakers
            .iter()
            .map(|speaker| SpeakerStats {
                id: speaker.id.clone(),
                name: speaker.name.clone(),
                speech_count: speaker.speech_count,
                share: if total > 0 {
                    speaker.speech_count as f64 / total as f64
                } else {
                    0.0
                },
                active_duration_ms: speaker
                    .last_seen
                    .signed_duration_since(speaker.first_seen)
                    .num_milliseconds(),
                preferred_language: speaker.profile.preferred_language,
                avg_confidence: speaker.profile.avg_confidence,
                color: speaker.color.clone(),
            })
            .collect()
    }
}

impl Default for SpeakerClassifier {
    fn default() -> Self {
        Self::new(SpeakerConfig::default())
    }
}
