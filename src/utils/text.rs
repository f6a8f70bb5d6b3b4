//! Character classes shared by the brand heuristic and the text checks.

use regex::Regex;
use std::sync::OnceLock;

/// First and last code points of the CJK Unified Ideographs block used for
/// Chinese product text.
pub const HAN_FIRST: char = '\u{4e00}';
pub const HAN_LAST: char = '\u{9fa5}';

pub fn is_han(c: char) -> bool {
    (HAN_FIRST..=HAN_LAST).contains(&c)
}

fn word_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[\x{4e00}-\x{9fa5}A-Za-z0-9_]+").ok())
        .as_ref()
}

/// Lowercased runs of Han characters and ASCII word characters.
///
/// A clause between two punctuation marks is one word, so repeated clauses
/// count as repeated words.
pub fn words(text: &str) -> Vec<String> {
    let Some(pattern) = word_pattern() else {
        return Vec::new();
    };
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_han_bounds() {
        assert!(is_han('吉'));
        assert!(is_han(HAN_LAST));
        assert!(!is_han('\u{9fa6}'));
        assert!(!is_han('，'));
        assert!(!is_han('a'));
    }

    #[test]
    fn test_words_split_on_punctuation() {
        assert_eq!(
            words("Mach3刀片, 3层 Blade！锋利，耐用"),
            vec!["mach3刀片", "3层", "blade", "锋利", "耐用"]
        );
        assert!(words("，。！").is_empty());
    }
}
