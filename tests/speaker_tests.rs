use std::time::Duration;

use loqa_subtitles::speaker::{LanguagePreference, SpeakerClassifier, SpeakerConfig};

const MEETING_ZH: &str = "我們今天開會討論一下";
const CASUAL_EN: &str = "um yeah like whatever";

fn short_gap() -> Duration {
    Duration::from_millis(300)
}

fn long_gap() -> Duration {
    Duration::from_secs(5)
}

#[test]
fn test_same_speaker_is_stable() {
    let mut classifier = SpeakerClassifier::default();

    let first = classifier.classify(MEETING_ZH, 0.95, Duration::ZERO);
    for _ in 0..5 {
        let next = classifier.classify(MEETING_ZH, 0.95, short_gap());
        assert_eq!(next.speaker_id, first.speaker_id);
        assert!(!next.is_new);
        assert!(!next.switched);
    }

    assert_eq!(classifier.speakers().len(), 1);
    assert_eq!(classifier.speakers()[0].speech_count, 6);
}

#[test]
fn test_short_gap_keeps_current_speaker_even_when_dissimilar() {
    let mut classifier = SpeakerClassifier::default();

    let first = classifier.classify(MEETING_ZH, 0.95, Duration::ZERO);
    let next = classifier.classify(CASUAL_EN, 0.5, short_gap());

    assert_eq!(next.speaker_id, first.speaker_id);
    assert_eq!(classifier.speakers().len(), 1);
}

#[test]
fn test_new_speaker_after_long_gap() {
    let mut classifier = SpeakerClassifier::default();

    classifier.classify(MEETING_ZH, 0.95, Duration::ZERO);
    let second = classifier.classify(CASUAL_EN, 0.5, long_gap());

    assert!(second.is_new);
    assert!(second.switched);
    assert_eq!(second.name, "Speaker 2");
    assert_eq!(second.color, "#e74c3c");
    assert_eq!(classifier.speakers().len(), 2);
    assert_eq!(
        classifier.current().map(|s| s.profile.preferred_language),
        Some(LanguagePreference::English)
    );
}

#[test]
fn test_switch_back_to_known_speaker() {
    let mut classifier = SpeakerClassifier::default();

    let first = classifier.classify(MEETING_ZH, 0.95, Duration::ZERO);
    classifier.classify(CASUAL_EN, 0.5, long_gap());
    let back = classifier.classify(MEETING_ZH, 0.95, long_gap());

    assert_eq!(back.speaker_id, first.speaker_id);
    assert!(!back.is_new);
    assert!(back.switched);
    assert_eq!(classifier.speakers().len(), 2);
    assert_eq!(classifier.speakers()[0].speech_count, 2);
}

#[test]
fn test_stats_shares_sum_to_one() {
    let mut classifier = SpeakerClassifier::default();

    classifier.classify(MEETING_ZH, 0.95, Duration::ZERO);
    classifier.classify(MEETING_ZH, 0.95, short_gap());
    classifier.classify(MEETING_ZH, 0.95, short_gap());
    classifier.classify(CASUAL_EN, 0.5, long_gap());

    let stats = classifier.stats();
    assert_eq!(stats.len(), 2);
    assert!((stats[0].share - 0.75).abs() < 1e-9);
    assert!((stats[1].share - 0.25).abs() < 1e-9);

    let total: f64 = stats.iter().map(|s| s.share).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn test_palette_wraps_around() {
    let config = SpeakerConfig {
        palette: vec!["red".into(), "blue".into()],
        // Nothing is ever similar enough to switch back to.
        switch_threshold: 1.0,
        ..Default::default()
    };
    let mut classifier = SpeakerClassifier::new(config);

    let colors: Vec<String> = (0..3)
        .map(|_| classifier.classify(MEETING_ZH, 0.9, long_gap()).color)
        .collect();

    assert_eq!(colors, vec!["red", "blue", "red"]);
    assert_eq!(classifier.speakers()[2].name, "Speaker 3");
}

#[tokio::test(start_paused = true)]
async fn test_observe_measures_silence() {
    let mut classifier = SpeakerClassifier::default();

    let first = classifier.observe(MEETING_ZH, 0.95);
    tokio::time::advance(Duration::from_millis(500)).await;
    let same = classifier.observe(CASUAL_EN, 0.5);
    assert_eq!(same.speaker_id, first.speaker_id);

    tokio::time::advance(Duration::from_secs(3)).await;
    let other = classifier.observe(CASUAL_EN, 0.5);
    assert!(other.is_new);
    assert!(other.switched);
    assert_ne!(other.speaker_id, first.speaker_id);
}
