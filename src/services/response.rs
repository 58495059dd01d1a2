use regex::Regex;
use std::sync::LazyLock;

use super::BatchTranslation;

static NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("numbering pattern"));

/// Raw reply text of a service plus the tokens it reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub tokens: u64,
}

impl Completion {
    pub fn into_batch(self, expected: usize) -> BatchTranslation {
        BatchTranslation {
            translations: parse_translations(self.text.trim(), expected),
            tokens: self.tokens,
        }
    }
}

/// Splits a model reply into one translation per line, dropping blank lines
/// and list numbering, then reconciles the count with `expected`.
pub fn parse_translations(reply: &str, expected: usize) -> Vec<String> {
    let lines = reply
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| NUMBERING.replace(line, "").into_owned())
        .collect();
    reconcile(lines, expected)
}

/// Pads a short list by repeating its last entry (or the empty string) and
/// truncates a long one.
pub fn reconcile(mut translations: Vec<String>, expected: usize) -> Vec<String> {
    if translations.len() > expected {
        translations.truncate(expected);
    }
    while translations.len() < expected {
        let filler = translations.last().cloned().unwrap_or_default();
        translations.push(filler);
    }
    translations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_reply_is_padded_with_last_entry() {
        let parsed = parse_translations("Un\nDeux\nTrois", 5);
        assert_eq!(parsed, vec!["Un", "Deux", "Trois", "Trois", "Trois"]);
    }

    #[test]
    fn long_reply_is_truncated() {
        let reply = "1. a\n2. b\n3. c\n4. d\n5. e\n6. f\n7. g";
        assert_eq!(parse_translations(reply, 5), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn numbering_and_blank_lines_are_dropped() {
        let parsed = parse_translations("\n3. Bonjour\n\n   \n10.Monde  \n", 2);
        assert_eq!(parsed, vec!["Bonjour", "Monde"]);
    }

    #[test]
    fn empty_reply_pads_with_empty_strings() {
        assert_eq!(parse_translations("  \n", 2), vec!["", ""]);
        assert!(parse_translations("anything", 0).is_empty());
    }

    #[test]
    fn only_leading_numbering_is_stripped() {
        let parsed = parse_translations("Version 2. Release", 1);
        assert_eq!(parsed, vec!["Version 2. Release"]);
    }
}
