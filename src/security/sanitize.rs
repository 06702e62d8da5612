//! Input sanitization and suspicious-text screening.
//!
//! # Design Decisions
//! - Sanitization never fails; unusable input collapses to an empty string
//! - Suspicious-pattern detection is a heuristic signal with expected false
//!   negatives, not a security boundary

use std::sync::LazyLock;

use regex::RegexSet;
use serde_json::Value;

/// Default maximum length, in characters, of a sanitized string.
pub const DEFAULT_MAX_LENGTH: usize = 1000;

/// Characters removed before the allow-list is applied.
const DENY_LIST: &[char] = &['<', '>', '"', '\'', '&'];

/// Punctuation kept alongside word characters and whitespace.
const ALLOWED_PUNCTUATION: &[char] = &['-', '_', '.', '@', '#'];

static SUSPICIOUS_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)ignore.*previous.*instructions",
        r"(?i)system.*prompt",
        r"(?i)you.*are.*now",
        r"(?i)forget.*everything",
        r"(?i)new.*instructions",
        r"(?i)assistant.*you.*must",
        r"(?i)override.*previous",
        r"(?i)disregard.*above",
    ])
    .expect("suspicious pattern set is valid")
});

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(&c)
}

/// Strip markup and unsafe characters, truncate to `max_length` characters, trim.
pub fn sanitize_str(input: &str, max_length: usize) -> String {
    let kept: String = input
        .chars()
        .filter(|c| !DENY_LIST.contains(c))
        .filter(|c| is_allowed(*c))
        .take(max_length)
        .collect();
    kept.trim().to_string()
}

/// Sanitize an untrusted JSON value. Anything other than a string yields `""`.
pub fn sanitize_string(input: &Value, max_length: usize) -> String {
    match input {
        Value::String(s) => sanitize_str(s, max_length),
        _ => String::new(),
    }
}

/// True when `text` matches one of the instruction-override heuristics.
pub fn detect_suspicious_pattern(text: &str) -> bool {
    SUSPICIOUS_PATTERNS.is_match(text)
}
