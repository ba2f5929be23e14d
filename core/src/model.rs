//! Wire types for rulesets, matching the JSON shape produced by the
//! external rule-CRUD store (`GET /config`, see SPEC_FULL.md).

use serde::{Deserialize, Serialize};

/// A complete ruleset as served by the rule store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ruleset {
    pub version: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Ruleset {
    /// Structural validation beyond what serde already enforces (§7):
    /// every rule needs a non-empty name and a non-zero rate limit/period.
    pub fn validate(&self) -> Result<(), crate::error::RuleValidationError> {
        for rule in &self.rules {
            if rule.name.trim().is_empty() {
                return Err(crate::error::RuleValidationError::EmptyRuleName(rule.name.clone()));
            }
            if rule.rate_limit.limit == 0 || rule.rate_limit.period == 0 {
                return Err(crate::error::RuleValidationError::ZeroRateLimit(rule.name.clone()));
            }
        }
        Ok(())
    }
}

/// A single named policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    pub rate_limit: RateLimitSpec,
    #[serde(default)]
    pub fingerprint: Option<FingerprintSpec>,
    pub initial_match: MatchBranch,
    #[serde(default)]
    pub else_if_actions: Vec<MatchBranch>,
    #[serde(default)]
    pub else_action: Option<Action>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub limit: u32,
    pub period: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintSpec {
    pub parameters: Vec<String>,
}

/// One branch of a rule: a condition tree, its combining logic, and the
/// action to take if it matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchBranch {
    pub conditions: Vec<ConditionNode>,
    pub logic: Logic,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    And,
    Or,
}

/// A node in a condition tree: either a leaf comparison or a nested group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    Group(GroupCondition),
    Leaf(LeafCondition),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCondition {
    #[serde(rename = "type")]
    pub node_type: GroupTag,
    pub logic: Logic,
    pub conditions: Vec<ConditionNode>,
}

/// Discriminant that forces `ConditionNode`'s untagged deserialization to
/// prefer `Group` only when `"type":"group"` is actually present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupTag {
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafCondition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub header_name: Option<String>,
    #[serde(default)]
    pub header_value: Option<String>,
    #[serde(default)]
    pub cookie_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
}

/// Tagged action variant. `Allow`, `Log`, `Simulate`, `Block` and
/// `RateLimit` are terminal/observational markers with no payload;
/// `CustomResponse` carries its own status/body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Allow,
    Log,
    Simulate,
    Block,
    RateLimit,
    #[serde(rename_all = "camelCase")]
    CustomResponse {
        status_code: u16,
        body: String,
        body_type: BodyType,
    },
}

impl Action {
    /// Terminal actions stop rule evaluation immediately on match (§4.3).
    /// Observational actions (`log`, `simulate`) are recorded and
    /// evaluation continues to subsequent rules.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Action::Log | Action::Simulate)
    }

    /// Lowercase name for logging/display, matching the wire tag.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Log => "log",
            Action::Simulate => "simulate",
            Action::Block => "block",
            Action::RateLimit => "rateLimit",
            Action::CustomResponse { .. } => "customResponse",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    Json,
    Html,
    #[serde(other)]
    Text,
}

impl BodyType {
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyType::Json => "application/json",
            BodyType::Html => "text/html",
            BodyType::Text => "text/plain",
        }
    }
}
