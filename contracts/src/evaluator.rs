use crate::assets::default_rulebook;
use crate::normalize::for_rules;
use crate::types::{Rulebook, RulebookError, Thresholds};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, fs};

pub const NO_RISK_FINDING: &str = "No major risks identified";
const LONG_SENTENCE_PREFIX: &str = "Long and complex sentence: ";
const ELLIPSIS: &str = "...";

// ----------------- Result -----------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Only `Low` is acceptable; everything else is flagged.
    pub fn is_acceptable(&self) -> bool {
        matches!(self, RiskLevel::Low)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Thresholds {
    /// First match wins, evaluated from high to low.
    pub fn level_for(&self, score: i32) -> RiskLevel {
        if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Wire shape shared with request handlers: exactly these three fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub findings: Vec<String>,
    pub verdict: bool,
}

/// An assessment together with the arithmetic that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub score: i32,
    /// Keyword terms that matched, in table order.
    pub matched_terms: Vec<String>,
    pub long_sentences: usize,
    pub assessment: RiskAssessment,
}

// ----------------- I/O -----------------

pub fn load_rulebook_from_file(path: &str) -> Result<Rulebook, RulebookError> {
    let content = fs::read_to_string(path).map_err(|source| RulebookError::Read {
        path: path.to_string(),
        source,
    })?;
    Rulebook::from_toml_str(&content)
}

// ----------------- Helpers -----------------

fn contains_risky_term(lowered: &str, rulebook: &Rulebook) -> bool {
    rulebook
        .risky
        .iter()
        .any(|rule| lowered.contains(rule.term.as_str()))
}

fn is_long_and_complex(fragment: &str, rulebook: &Rulebook) -> bool {
    if fragment.split_whitespace().count() <= rulebook.complexity.max_words {
        return false;
    }
    contains_risky_term(&for_rules(fragment), rulebook)
}

/// First `max_chars` characters, never splitting a code point.
fn preview(fragment: &str, max_chars: usize) -> &str {
    match fragment.char_indices().nth(max_chars) {
        Some((end, _)) => &fragment[..end],
        None => fragment,
    }
}

// ----------------- Core -----------------

pub fn evaluate_text_against_rulebook(text: &str, rulebook: &Rulebook) -> Evaluation {
    let lowered = for_rules(text);
    let mut findings: Vec<String> = Vec::new();
    let mut matched_terms: Vec<String> = Vec::new();
    let mut score = 0i32;

    // Pass 1: keyword presence, risky table then mitigating table
    for rule in rulebook.risky.iter().chain(rulebook.mitigating.iter()) {
        if lowered.contains(rule.term.as_str()) {
            findings.push(rule.message.clone());
            matched_terms.push(rule.term.clone());
            score = score.saturating_add(rule.weight);
        }
    }

    // Pass 2: long fragments that also mention a risky term
    let mut long_sentences = 0usize;
    for fragment in text.split('.') {
        if !is_long_and_complex(fragment, rulebook) {
            continue;
        }
        findings.push(format!(
            "{LONG_SENTENCE_PREFIX}{}{ELLIPSIS}",
            preview(fragment, rulebook.complexity.preview_chars)
        ));
        score = score.saturating_add(rulebook.complexity.penalty);
        long_sentences += 1;
    }

    let risk_level = rulebook.thresholds.level_for(score);
    if findings.is_empty() {
        findings.push(NO_RISK_FINDING.to_string());
    }

    Evaluation {
        score,
        matched_terms,
        long_sentences,
        assessment: RiskAssessment {
            risk_level,
            findings,
            verdict: risk_level.is_acceptable(),
        },
    }
}

/// Stateless scorer bound to a rulebook. Cheap to share across threads.
#[derive(Debug, Clone)]
pub struct Scorer<'r> {
    rulebook: Cow<'r, Rulebook>,
}

impl Default for Scorer<'static> {
    fn default() -> Self {
        Self {
            rulebook: Cow::Borrowed(default_rulebook()),
        }
    }
}

impl<'r> Scorer<'r> {
    pub fn new(rulebook: &'r Rulebook) -> Self {
        Self {
            rulebook: Cow::Borrowed(rulebook),
        }
    }

    pub fn with_owned(rulebook: Rulebook) -> Scorer<'static> {
        Scorer {
            rulebook: Cow::Owned(rulebook),
        }
    }

    pub fn rulebook(&self) -> &Rulebook {
        &self.rulebook
    }

    pub fn score(&self, text: &str) -> RiskAssessment {
        self.evaluate(text).assessment
    }

    pub fn evaluate(&self, text: &str) -> Evaluation {
        evaluate_text_against_rulebook(text, &self.rulebook)
    }
}

/// Score `text` against the default rulebook.
pub fn score(text: &str) -> RiskAssessment {
    evaluate_text_against_rulebook(text, default_rulebook()).assessment
}
