//! Conversation language directory: BCP-47 codes, display names and recognition hints.

pub const DEFAULT_LANGUAGE_CODE: &str = "en-US";

const LANGUAGES: &[(&str, &str, &str)] = &[
    ("en-US", "en", "English"),
    ("id-ID", "id", "Bahasa Indonesia"),
    ("es-ES", "es", "Spanish"),
    ("fr-FR", "fr", "French"),
    ("de-DE", "de", "German"),
    ("pt-BR", "pt", "Portuguese"),
    ("it-IT", "it", "Italian"),
    ("ja-JP", "ja", "Japanese"),
    ("ko-KR", "ko", "Korean"),
    ("zh-CN", "zh", "Chinese (Mandarin)"),
    ("ar-SA", "ar", "Arabic"),
    ("hi-IN", "hi", "Hindi"),
    ("ru-RU", "ru", "Russian"),
    ("nl-NL", "nl", "Dutch"),
    ("tr-TR", "tr", "Turkish"),
];

fn lookup(code: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    let code = code.trim();
    LANGUAGES.iter().find(|(full, short, _)| {
        full.eq_ignore_ascii_case(code) || short.eq_ignore_ascii_case(code)
    })
}

/// Canonical BCP-47 code; unknown or empty input falls back to English.
pub fn normalize_code(code: &str) -> &'static str {
    lookup(code).map(|(full, _, _)| *full).unwrap_or(DEFAULT_LANGUAGE_CODE)
}

/// Canonical code for an optional subtitle language; empty or unknown input turns subtitles off.
pub fn normalize_optional_code(code: &str) -> &'static str {
    lookup(code).map(|(full, _, _)| *full).unwrap_or("")
}

pub fn is_supported(code: &str) -> bool {
    lookup(code).is_some()
}

/// Human-readable name used inside model instructions.
pub fn language_name(code: &str) -> &'static str {
    lookup(code).map(|(_, _, name)| *name).unwrap_or("English")
}

/// ISO 639-1 code used as the speech recognition hint.
pub fn recognition_hint(code: &str) -> &'static str {
    lookup(code).map(|(_, short, _)| *short).unwrap_or("en")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_codes() {
        assert_eq!(normalize_code("ja-jp"), "ja-JP");
        assert_eq!(normalize_code("id"), "id-ID");
        assert_eq!(language_name("zh-CN"), "Chinese (Mandarin)");
        assert_eq!(recognition_hint("pt-BR"), "pt");
    }

    #[test]
    fn unknown_codes_fall_back_to_english() {
        assert_eq!(normalize_code("xx-XX"), "en-US");
        assert_eq!(normalize_code(""), "en-US");
        assert_eq!(language_name("klingon"), "English");
        assert!(!is_supported("klingon"));
    }

    #[test]
    fn empty_or_unknown_subtitle_language_disables_subtitles() {
        assert_eq!(normalize_optional_code("  "), "");
        assert_eq!(normalize_optional_code("fr-FR"), "fr-FR");
        assert_eq!(normalize_optional_code("xx-XX"), "");
    }
}
