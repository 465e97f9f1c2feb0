// Public modules so agreewise-core can use them
pub mod assets;
pub mod evaluator;
pub mod normalize;
pub mod types;

pub use assets::{default_rulebook, default_rulebook_text, write_default_rulebook};
pub use evaluator::{
    evaluate_text_against_rulebook, load_rulebook_from_file, score, Evaluation, RiskAssessment,
    RiskLevel, Scorer, NO_RISK_FINDING,
};
pub use normalize::for_rules as normalize_for_rules;
pub use types::{ComplexityPolicy, RiskKeywordRule, Rulebook, RulebookError, Thresholds};

/// --- Pure Rust API: score against a rulebook given as TOML text ---
pub fn evaluate_rulebook_toml(
    toml_rulebook: &str,
    text: &str,
) -> Result<Evaluation, RulebookError> {
    let rulebook = Rulebook::from_toml_str(toml_rulebook)?;
    Ok(evaluate_text_against_rulebook(text, &rulebook))
}
