//! Text normalization used for rule matching.
//!
//! Policy:
//! - Unicode-aware lowercasing (`str::to_lowercase`).
//! - Nothing is dropped. Newlines and tabs separate words, so stripping
//!   control characters would glue terms across line breaks.
//!
//! Rule terms and document text both go through here so they cannot drift.

/// Normalize text for case-insensitive rule matching.
pub fn for_rules(s: &str) -> String {
    s.to_lowercase()
}
