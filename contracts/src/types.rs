use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::for_rules;

/// One keyword entry of a rulebook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RiskKeywordRule {
    /// Lowercase substring matched against the lowercased document.
    pub term: String,
    /// Positive raises risk, negative mitigates it.
    pub weight: i32,
    /// Finding text emitted when the term is present.
    pub message: String,
}

impl RiskKeywordRule {
    pub fn new(term: &str, weight: i32, message: &str) -> Self {
        Self {
            term: term.to_string(),
            weight,
            message: message.to_string(),
        }
    }
}

/// Long-sentence scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ComplexityPolicy {
    /// A fragment must have strictly more words than this to count as long.
    #[serde(default = "ComplexityPolicy::default_max_words")]
    pub max_words: usize,
    #[serde(default = "ComplexityPolicy::default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "ComplexityPolicy::default_penalty")]
    pub penalty: i32,
}

impl ComplexityPolicy {
    fn default_max_words() -> usize {
        50
    }

    fn default_preview_chars() -> usize {
        100
    }

    fn default_penalty() -> i32 {
        1
    }
}

impl Default for ComplexityPolicy {
    fn default() -> Self {
        Self {
            max_words: Self::default_max_words(),
            preview_chars: Self::default_preview_chars(),
            penalty: Self::default_penalty(),
        }
    }
}

/// Inclusive lower bounds for the medium and high levels.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Thresholds {
    #[serde(default = "Thresholds::default_high")]
    pub high: i32,
    #[serde(default = "Thresholds::default_medium")]
    pub medium: i32,
}

impl Thresholds {
    fn default_high() -> i32 {
        5
    }

    fn default_medium() -> i32 {
        3
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: Self::default_high(),
            medium: Self::default_medium(),
        }
    }
}

/// Risky and mitigating keyword tables plus the scoring policy around them.
///
/// Table order is significant: findings are reported in the order rules
/// appear here, risky table first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rulebook {
    #[serde(default = "Rulebook::default_name")]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub complexity: ComplexityPolicy,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub risky: Vec<RiskKeywordRule>,
    #[serde(default)]
    pub mitigating: Vec<RiskKeywordRule>,
}

#[derive(Debug, Error)]
pub enum RulebookError {
    #[error("failed to parse rulebook: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read rulebook {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{table} rule #{index} has an empty term")]
    EmptyTerm { table: &'static str, index: usize },
    #[error("{table} rule {term:?} has an empty message")]
    EmptyMessage { table: &'static str, term: String },
    #[error("risky rule {term:?} must have a positive weight (got {weight})")]
    NonPositiveRisky { term: String, weight: i32 },
    #[error("mitigating rule {term:?} must have a negative weight (got {weight})")]
    NonNegativeMitigating { term: String, weight: i32 },
    #[error("medium threshold {medium} exceeds high threshold {high}")]
    ThresholdOrder { medium: i32, high: i32 },
}

impl Rulebook {
    fn default_name() -> String {
        "custom".to_string()
    }

    /// Parse a rulebook from TOML, normalize its terms and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, RulebookError> {
        let mut book: Rulebook = toml::from_str(text)?;
        book.normalize_terms();
        book.validate()?;
        Ok(book)
    }

    fn normalize_terms(&mut self) {
        for rule in self.risky.iter_mut().chain(self.mitigating.iter_mut()) {
            rule.term = for_rules(rule.term.trim());
        }
    }

    pub fn validate(&self) -> Result<(), RulebookError> {
        check_table("risky", &self.risky)?;
        check_table("mitigating", &self.mitigating)?;

        if let Some(rule) = self.risky.iter().find(|r| r.weight <= 0) {
            return Err(RulebookError::NonPositiveRisky {
                term: rule.term.clone(),
                weight: rule.weight,
            });
        }
        if let Some(rule) = self.mitigating.iter().find(|r| r.weight >= 0) {
            return Err(RulebookError::NonNegativeMitigating {
                term: rule.term.clone(),
                weight: rule.weight,
            });
        }
        if self.thresholds.medium > self.thresholds.high {
            return Err(RulebookError::ThresholdOrder {
                medium: self.thresholds.medium,
                high: self.thresholds.high,
            });
        }
        Ok(())
    }

    /// Total number of keyword rules across both tables.
    pub fn len(&self) -> usize {
        self.risky.len() + self.mitigating.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_table(table: &'static str, rules: &[RiskKeywordRule]) -> Result<(), RulebookError> {
    for (index, rule) in rules.iter().enumerate() {
        if rule.term.is_empty() {
            return Err(RulebookError::EmptyTerm { table, index });
        }
        if rule.message.trim().is_empty() {
            return Err(RulebookError::EmptyMessage {
                table,
                term: rule.term.clone(),
            });
        }
    }
    Ok(())
}
