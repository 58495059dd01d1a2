/// Display names sent to the model instead of bare language codes.
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("es", "Español"),
    ("fr", "Français"),
    ("de", "Deutsch"),
    ("it", "Italiano"),
    ("pt", "Português"),
    ("ru", "Русский"),
    ("ja", "日本語"),
    ("ko", "한국어"),
    ("zh", "简体中文"),
    ("zh-TW", "繁體中文"),
    ("ar", "العربية"),
    ("hi", "हिन्दी"),
    ("en", "English"),
];

/// Returns the display name for `code`, or the code itself when unknown.
pub fn language_name(code: &str) -> &str {
    LANGUAGE_NAMES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

pub fn supported_codes() -> impl Iterator<Item = &'static str> {
    LANGUAGE_NAMES.iter().map(|(code, _)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_native_names() {
        assert_eq!(language_name("fr"), "Français");
        assert_eq!(language_name("zh-TW"), "繁體中文");
        assert_eq!(language_name("en"), "English");
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(language_name("sv"), "sv");
        assert_eq!(language_name("FR"), "FR");
        assert_eq!(supported_codes().count(), 13);
    }
}
