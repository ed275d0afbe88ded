// src/text.rs
//! Text normalization primitives shared by the ranker, the fetcher and the auditor.
//!
//! - `tokenize`: lower-case, keep `[a-z0-9\s]` only, split on whitespace.
//! - `collapse_whitespace`: single spaces, trimmed.
//! - `truncate_chars`: char-boundary safe prefix.
//!
//! No stemming and no stop-word removal here; keyword policy lives in `audit`.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("non-alnum regex"));

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Lower-case, strip everything outside `[a-z0-9\s]`, split on whitespace.
///
/// Non-ASCII letters are removed rather than transliterated, so `"café"` yields `"caf"`.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let lowered = text.to_lowercase();
    RE_NON_ALNUM
        .replace_all(&lowered, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Collapse any whitespace run into one space and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

/// Prefix of at most `max` chars (never splits a code point).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Short SHA-256 prefix used to refer to raw text in logs without logging it.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Normalized form of a search query: trimmed and lower-cased.
pub fn normalize_query(q: &str) -> String {
    q.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_punctuation_and_lowercases() {
        let toks = tokenize("Sodium, Potassium & K+ (mg/day)!");
        assert_eq!(toks, vec!["sodium", "potassium", "k", "mgday"]);
    }

    #[test]
    fn tokenize_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t ").is_empty());
    }

    #[test]
    fn tokenize_drops_non_ascii_letters() {
        assert_eq!(tokenize("Café 2024"), vec!["caf", "2024"]);
    }

    #[test]
    fn collapse_runs_and_trims() {
        assert_eq!(collapse_whitespace("  a \n\n b\tc  "), "a b c");
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_chars("žluťoučký kůň", 4), "žluť");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn anon_hash_is_stable_and_short() {
        assert_eq!(anon_hash("abc"), "ba7816bf8f01");
        assert_eq!(anon_hash("abc").len(), 12);
    }

    #[test]
    fn normalize_query_trims_and_lowercases() {
        assert_eq!(normalize_query("  Sodium Intake "), "sodium intake");
    }
}
