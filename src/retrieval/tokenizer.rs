//! Word tokenization shared by corpus indexing and query scoring.

use std::sync::LazyLock;

use regex::Regex;

/// A word is a run of ASCII alphanumerics, underscore, hyphen, or accented
/// Latin letters (Latin-1 Supplement and Latin Extended-A). Everything else
/// separates words.
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9_\-\u{00C0}-\u{017F}]+").expect("word pattern must compile")
});

/// Splits text into lowercase word tokens.
///
/// Punctuation and whitespace act as separators and never appear inside a
/// token. This is a total function: empty input (or input with no word
/// characters at all) yields an empty vector.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_on_whitespace() {
        assert_eq!(tokenize("Paris is the Capital"), vec!["paris", "is", "the", "capital"]);
    }

    #[test]
    fn punctuation_separates_tokens() {
        assert_eq!(tokenize("hello, world! (really)"), vec!["hello", "world", "really"]);
    }

    #[test]
    fn keeps_hyphens_underscores_and_digits() {
        assert_eq!(tokenize("top-k chunk_size 700"), vec!["top-k", "chunk_size", "700"]);
    }

    #[test]
    fn keeps_accented_letters() {
        assert_eq!(tokenize("revisão São Paulo"), vec!["revisão", "são", "paulo"]);
    }

    #[test]
    fn empty_input_yields_empty_vec() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("!!! ... ???").is_empty());
    }
}
