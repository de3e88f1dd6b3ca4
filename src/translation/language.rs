//! Language code helpers shared by the providers, the orchestrator and the
//! recognition language auto-switch.

/// Source language assumed when nothing can be detected.
pub const DEFAULT_LANGUAGE: &str = "zh-tw";

pub fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{30ff}').contains(&c)
}

fn is_hangul(c: char) -> bool {
    ('\u{ac00}'..='\u{d7af}').contains(&c)
}

/// Cheap local detection: any CJK ideograph means Chinese, otherwise any
/// Latin letter means English.
pub fn detect_source_language(text: &str) -> &'static str {
    if text.chars().any(is_cjk_ideograph) {
        DEFAULT_LANGUAGE
    } else if text.chars().any(|c| c.is_ascii_alphabetic()) {
        "en"
    } else {
        DEFAULT_LANGUAGE
    }
}

/// Normalize a language code to the form used as result keys.
pub fn normalize_language(code: &str) -> String {
    let lower = code.trim().to_ascii_lowercase();
    match lower.as_str() {
        "zh" | "zh-cn" | "zh-tw" | "zh-hant" | "zh-hans" | "auto" | "" => DEFAULT_LANGUAGE.to_string(),
        _ => lower,
    }
}

/// Human-readable language name used inside translation prompts.
pub fn display_name(code: &str) -> String {
    let name = match normalize_language(code).as_str() {
        "zh-tw" => "Traditional Chinese",
        "en" => "English",
        "ja" => "Japanese",
        "ko" => "Korean",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        other => return other.to_string(),
    };
    name.to_string()
}

/// Language code in the format expected by the free-tier endpoint.
pub fn free_tier_code(code: &str) -> String {
    match code.trim().to_ascii_lowercase().as_str() {
        "zh-tw" => "zh-TW".to_string(),
        "zh" | "zh-cn" => "zh-CN".to_string(),
        other => other.to_string(),
    }
}

/// Recognition locale suggested by the script of a finalized utterance.
pub fn recognition_locale_for(text: &str) -> Option<&'static str> {
    // Japanese mixes kanji with kana, so kana decides first.
    if text.chars().any(is_kana) {
        Some("ja-JP")
    } else if text.chars().any(is_cjk_ideograph) {
        Some("zh-TW")
    } else if text.chars().any(is_hangul) {
        Some("ko-KR")
    } else if text.chars().any(|c| c.is_ascii_alphabetic()) {
        Some("en-US")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_source_language() {
        assert_eq!(detect_source_language("你好"), "zh-tw");
        assert_eq!(detect_source_language("hello 你好"), "zh-tw");
        assert_eq!(detect_source_language("How are you?"), "en");
        assert_eq!(detect_source_language("12345"), "zh-tw");
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("zh"), "zh-tw");
        assert_eq!(normalize_language("zh-CN"), "zh-tw");
        assert_eq!(normalize_language("auto"), "zh-tw");
        assert_eq!(normalize_language("EN"), "en");
        assert_eq!(normalize_language("ja"), "ja");
    }

    #[test]
    fn test_free_tier_code() {
        assert_eq!(free_tier_code("zh-tw"), "zh-TW");
        assert_eq!(free_tier_code("zh"), "zh-CN");
        assert_eq!(free_tier_code("en"), "en");
    }

    #[test]
    fn test_recognition_locale() {
        assert_eq!(recognition_locale_for("今天天氣很好"), Some("zh-TW"));
        assert_eq!(recognition_locale_for("こんにちは"), Some("ja-JP"));
        assert_eq!(recognition_locale_for("今日は会議があります"), Some("ja-JP"));
        assert_eq!(recognition_locale_for("안녕하세요"), Some("ko-KR"));
        assert_eq!(recognition_locale_for("good morning"), Some("en-US"));
        assert_eq!(recognition_locale_for("123"), None);
    }
}
