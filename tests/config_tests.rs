use std::fs;

use loqa_subtitles::{Config, ProviderId};
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("subtitles.toml");
    fs::write(&path, contents).unwrap();
    dir.path().join("subtitles").to_string_lossy().into_owned()
}

#[test]
fn test_bundled_config_loads() {
    let path = format!("{}/config/loqa-subtitles", env!("CARGO_MANIFEST_DIR"));
    let cfg = Config::load(&path).unwrap();

    assert_eq!(cfg.service.http.port, 3002);
    assert_eq!(cfg.translation.provider, ProviderId::Regional);
    assert_eq!(cfg.translation.target_languages, vec!["zh-tw", "en"]);
    assert_eq!(cfg.translation.queue_capacity, 10);
    assert_eq!(cfg.translation.providers.free.rate_limit.max_per_minute, 30);
    assert_eq!(cfg.translation.providers.prompt.rate_limit.min_interval_ms, 1000);
    assert_eq!(cfg.recognition.max_retries, 5);
    assert_eq!(cfg.speaker.keep_threshold, 0.7);
    assert_eq!(cfg.session.min_final_confidence, 0.6);
    assert_eq!(cfg.session.min_interim_confidence, 0.3);
}

#[test]
fn test_partial_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[translation]
provider = "free"
target_languages = ["en", "ja"]

[recognition]
max_retries = 2
"#,
    );

    let cfg = Config::load(&path).unwrap();

    assert_eq!(cfg.translation.provider, ProviderId::Free);
    assert_eq!(cfg.translation.target_languages, vec!["en", "ja"]);
    assert_eq!(cfg.translation.max_in_flight, 3);
    assert_eq!(cfg.translation.request_timeout_ms, 10_000);
    assert_eq!(cfg.recognition.max_retries, 2);
    assert_eq!(cfg.recognition.backoff_cap_ms, 5000);
    assert_eq!(cfg.session.recognition_language, "zh-TW");
    assert_eq!(cfg.speaker.palette.len(), 8);
    assert!(cfg.translation.providers.regional.api_key.is_none());
}

#[test]
fn test_provider_aliases() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[translation]\nprovider = \"openai\"\n");

    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.translation.provider, ProviderId::Prompt);
}

#[test]
fn test_session_config_from_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
speaker_detection = false
auto_switch_language = true
min_final_confidence = 0.8

[speaker]
name_prefix = "Voice"
"#,
    );

    let cfg = Config::load(&path).unwrap();
    let session = cfg.session_config("standup");

    assert_eq!(session.session_id, "standup");
    assert!(!session.speaker_detection);
    assert!(session.auto_switch_language);
    assert_eq!(session.min_final_confidence, 0.8);
    assert_eq!(session.min_interim_confidence, 0.3);
    assert!(session.target_languages.is_none());
    assert_eq!(session.speaker.name_prefix, "Voice");
}

#[test]
fn test_environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[service]\nname = \"from-file\"\n");

    std::env::set_var("LOQA_SUBTITLES__SERVICE__NAME", "from-env");
    let cfg = Config::load(&path);
    std::env::remove_var("LOQA_SUBTITLES__SERVICE__NAME");

    assert_eq!(cfg.unwrap().service.name, "from-env");
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent").to_string_lossy().into_owned();

    assert!(Config::load(&path).is_err());
}

#[test]
fn test_invalid_value_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[service.http]\nport = \"not-a-port\"\n");

    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("Invalid configuration"));
}
