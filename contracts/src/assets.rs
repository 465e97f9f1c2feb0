use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use std::{fs, path::Path};

use crate::types::{ComplexityPolicy, RiskKeywordRule, Rulebook, Thresholds};

/// === Embedded default rulebook ===
pub const CONTRACT_RISK_TOML_NAME: &str = "contract_risk.toml";
pub const CONTRACT_RISK_TOML: &str = include_str!("../assets/contract_risk.toml");

const RISKY: &[(&str, i32, &str)] = &[
    ("confidential", 2, "Confidentiality clause is too restrictive"),
    ("non-compete", 3, "Non-compete clause is overly broad"),
    ("termination", 2, "Termination terms are unclear"),
    ("indemnification", 3, "Indemnification clause is too one-sided"),
    ("liability", 3, "Liability clause is overly restrictive"),
    ("arbitration", 2, "Arbitration clause limits legal recourse"),
];

const MITIGATING: &[(&str, i32, &str)] = &[
    ("mutual", -1, "Mutual agreement detected"),
    ("fair", -1, "Fair terms detected"),
    ("reasonable", -1, "Reasonable terms detected"),
];

static DEFAULT_RULEBOOK: Lazy<Rulebook> = Lazy::new(|| Rulebook {
    name: "contract_risk".to_string(),
    version: Some("1.0.0".to_string()),
    description: Some("Heuristic keyword scoring for commercial agreements".to_string()),
    complexity: ComplexityPolicy::default(),
    thresholds: Thresholds::default(),
    risky: to_rules(RISKY),
    mitigating: to_rules(MITIGATING),
});

fn to_rules(table: &[(&str, i32, &str)]) -> Vec<RiskKeywordRule> {
    table
        .iter()
        .map(|(term, weight, message)| RiskKeywordRule::new(term, *weight, message))
        .collect()
}

/// The compiled-in rulebook, built once per process and never mutated.
pub fn default_rulebook() -> &'static Rulebook {
    &DEFAULT_RULEBOOK
}

/// Return the embedded text for a known rulebook, if any.
pub fn default_rulebook_text(name: &str) -> Option<&'static str> {
    match name {
        CONTRACT_RISK_TOML_NAME => Some(CONTRACT_RISK_TOML),
        _ => None,
    }
}

/// Seed missing default rulebooks into a destination directory (idempotent).
/// Returns a list of files that were created.
pub fn write_default_rulebook(dir: impl AsRef<Path>) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("create_dir_all({:?})", dir))?;

    let mut created = Vec::new();

    for (name, text) in [(CONTRACT_RISK_TOML_NAME, CONTRACT_RISK_TOML)] {
        let path = dir.join(name);
        if !path.exists() {
            fs::write(&path, text).with_context(|| format!("write {:?}", path))?;
            created.push(name.to_string());
        }
    }

    Ok(created)
}
