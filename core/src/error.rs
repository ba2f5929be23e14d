//! Error and warning types shared across the core crate (§7).

use thiserror::Error;

/// Failures that prevent a ruleset from loading at all. Callers of the
/// config cache treat these as fail-stale/fail-open triggers, never panics.
#[derive(Debug, Error)]
pub enum RuleValidationError {
    #[error("malformed ruleset JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("rule '{0}' has an empty name")]
    EmptyRuleName(String),
    #[error("rule '{0}' has a zero-valued rate limit or period")]
    ZeroRateLimit(String),
}

/// Non-fatal issues surfaced during matching or evaluation; these degrade
/// to a safe default (a `false` condition, a skipped rule) rather than
/// aborting the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Warning(pub String);

impl From<crate::evaluator::Warning> for Warning {
    fn from(w: crate::evaluator::Warning) -> Self {
        Warning(w.0)
    }
}
