//! Input parsing - raw text to candidate names
//!
//! Names are maximal runs of word characters (Unicode `\w`: letters, digits,
//! underscore). Everything else separates them, so "Ann, Bob;Cy" and
//! "Ann Bob Cy" parse the same way. Only the first [`MAX_CANDIDATES`] tokens
//! are kept.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Upper bound on names sent to the predictor per submission
pub const MAX_CANDIDATES: usize = 10;

static WORD_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("static regex"));

/// Result of tokenizing one submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedInput {
    /// Tokens that will be scored, in submission order (may repeat)
    pub candidates: Vec<String>,
    /// Tokens past the limit, never sent to the predictor
    pub dropped: Vec<String>,
}

impl ParsedInput {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn was_truncated(&self) -> bool {
        !self.dropped.is_empty()
    }

    /// Human readable note when the submission was cut short
    pub fn truncation_note(&self) -> Option<String> {
        if !self.was_truncated() {
            return None;
        }
        Some(format!(
            "Only the first {} names were used; {} ignored: {}",
            self.candidates.len(),
            self.dropped.len(),
            self.dropped.join(", ")
        ))
    }
}

/// Tokenize raw input. `None` is treated like an empty string.
pub fn parse_names(raw: Option<&str>) -> ParsedInput {
    let Some(raw) = raw else {
        return ParsedInput::default();
    };

    let mut candidates = Vec::new();
    let mut dropped = Vec::new();
    for token in WORD_RUN.find_iter(raw).map(|m| m.as_str().to_string()) {
        if candidates.len() < MAX_CANDIDATES {
            candidates.push(token);
        } else {
            dropped.push(token);
        }
    }

    ParsedInput {
        candidates,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_splits_on_spaces_and_punctuation() {
        let parsed = parse_names(Some("Alice, Bob;carol  Dave-Eve"));
        assert_eq!(
            parsed.candidates,
            vec!["Alice", "Bob", "carol", "Dave", "Eve"]
        );
        assert!(!parsed.was_truncated());
        assert_eq!(parsed.truncation_note(), None);
    }

    #[test]
    fn test_repeats_are_kept() {
        let parsed = parse_names(Some("Alice Bob Alice"));
        assert_eq!(parsed.candidates, vec!["Alice", "Bob", "Alice"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(parse_names(None).is_empty());
        assert!(parse_names(Some("")).is_empty());
        assert!(parse_names(Some(" , , ")).is_empty());
        assert!(parse_names(Some("\t\n!?")).is_empty());
    }

    #[test]
    fn test_unicode_and_digits_pass_through() {
        let parsed = parse_names(Some("José Zoë 42 under_score"));
        assert_eq!(parsed.candidates, vec!["José", "Zoë", "42", "under_score"]);
    }

    #[test]
    fn test_truncates_to_first_ten() {
        let input = (1..=15)
            .map(|i| format!("Name{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let parsed = parse_names(Some(&input));

        assert_eq!(parsed.candidates.len(), MAX_CANDIDATES);
        assert_eq!(parsed.candidates[0], "Name1");
        assert_eq!(parsed.candidates[9], "Name10");
        assert_eq!(
            parsed.dropped,
            vec!["Name11", "Name12", "Name13", "Name14", "Name15"]
        );
        let note = parsed.truncation_note().unwrap();
        assert!(note.starts_with("Only the first 10 names were used; 5 ignored"));
    }

    proptest! {
        #[test]
        fn prop_bounded_word_tokens(s in any::<String>()) {
            let parsed = parse_names(Some(&s));
            prop_assert!(parsed.candidates.len() <= MAX_CANDIDATES);
            let whole_word = Regex::new(r"^\w+$").unwrap();
            for token in parsed.candidates.iter().chain(parsed.dropped.iter()) {
                prop_assert!(!token.is_empty());
                prop_assert!(whole_word.is_match(token));
            }
            if !parsed.dropped.is_empty() {
                prop_assert_eq!(parsed.candidates.len(), MAX_CANDIDATES);
            }
        }

        #[test]
        fn prop_order_preserved(names in proptest::collection::vec("[A-Za-z]{1,8}", 0..20)) {
            let parsed = parse_names(Some(&names.join(", ")));
            let expected: Vec<String> = names.iter().take(MAX_CANDIDATES).cloned().collect();
            prop_assert_eq!(parsed.candidates, expected);
        }
    }
}
