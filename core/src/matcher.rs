//! Ordered rule matching (§4.3): walk a rule's `initialMatch` branch, then
//! its `elseIfActions` in order, falling back to `elseAction`. The first
//! branch whose conditions match wins; within a rule, an observational
//! action (`log`/`simulate`) is recorded but evaluation continues to the
//! next branch, while a terminal action stops the walk immediately.

use crate::evaluator::{evaluate_all, Warning};
use crate::facts::RequestFacts;
use crate::model::{Action, MatchBranch, Rule};

/// Outcome of walking a single rule against a request.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub rule_name: String,
    pub action: Action,
}

/// Walk `rules` in order. Returns the first terminal action encountered,
/// collecting any observational (`log`/`simulate`) actions seen along the
/// way so the pipeline can record them even though they don't stop the walk.
pub fn match_rules(rules: &[Rule], facts: &RequestFacts) -> (Option<RuleMatch>, Vec<RuleMatch>, Vec<Warning>) {
    let mut observed = Vec::new();
    let mut warnings = Vec::new();

    for rule in rules {
        let (branch_match, rule_warnings) = match_rule(rule, facts);
        warnings.extend(rule_warnings);
        if let Some(action) = branch_match {
            let rule_match = RuleMatch { rule_name: rule.name.clone(), action: action.clone() };
            if action.is_terminal() {
                return (Some(rule_match), observed, warnings);
            }
            observed.push(rule_match);
        }
    }
    (None, observed, warnings)
}

/// Evaluate one rule's branches in order: `initialMatch`, then each of
/// `elseIfActions`, falling back to `elseAction` if none matched. A rule
/// with `elseIfActions` but no `elseAction` is malformed (§3) and is
/// skipped entirely, as if it weren't in the ruleset at all.
fn match_rule(rule: &Rule, facts: &RequestFacts) -> (Option<Action>, Vec<Warning>) {
    let mut warnings = Vec::new();

    if !rule.else_if_actions.is_empty() && rule.else_action.is_none() {
        warnings.push(Warning(format!(
            "rule '{}' has elseIfActions but no elseAction, skipping",
            rule.name
        )));
        return (None, warnings);
    }

    if let Some(action) = try_branch(&rule.initial_match, facts, &mut warnings) {
        return (Some(action), warnings);
    }
    for branch in &rule.else_if_actions {
        if let Some(action) = try_branch(branch, facts, &mut warnings) {
            return (Some(action), warnings);
        }
    }
    (rule.else_action.clone(), warnings)
}

fn try_branch(branch: &MatchBranch, facts: &RequestFacts, warnings: &mut Vec<Warning>) -> Option<Action> {
    let (matched, branch_warnings) = evaluate_all(&branch.conditions, branch.logic, facts);
    warnings.extend(branch_warnings);
    matched.then(|| branch.action.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Logic, Operator, RateLimitSpec};
    use std::collections::HashMap;

    fn facts() -> RequestFacts {
        RequestFacts {
            method: "POST".to_string(),
            url: "https://example.com/api/login".to_string(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            cf: serde_json::json!({}),
            body: vec![],
            edge_client_ip: None,
        }
    }

    fn leaf_branch(field: &str, value: &str, action: Action) -> MatchBranch {
        MatchBranch {
            conditions: vec![crate::model::ConditionNode::Leaf(crate::model::LeafCondition {
                field: field.to_string(),
                operator: Operator::Eq,
                value: value.to_string(),
                header_name: None,
                header_value: None,
                cookie_name: None,
            })],
            logic: Logic::And,
            action,
        }
    }

    fn rule(name: &str, initial_match: MatchBranch, else_if: Vec<MatchBranch>, else_action: Option<Action>) -> Rule {
        Rule {
            name: name.to_string(),
            rate_limit: RateLimitSpec { limit: 10, period: 60 },
            fingerprint: None,
            initial_match,
            else_if_actions: else_if,
            else_action,
        }
    }

    #[test]
    fn terminal_action_stops_the_walk() {
        let rules = vec![
            rule("r1", leaf_branch("method", "POST", Action::Block), vec![], None),
            rule("r2", leaf_branch("method", "POST", Action::Allow), vec![], None),
        ];
        let (terminal, observed, _) = match_rules(&rules, &facts());
        assert_eq!(terminal.unwrap().rule_name, "r1");
        assert!(observed.is_empty());
    }

    #[test]
    fn observational_action_continues_to_next_rule() {
        let rules = vec![
            rule("r1", leaf_branch("method", "POST", Action::Log), vec![], None),
            rule("r2", leaf_branch("method", "POST", Action::Block), vec![], None),
        ];
        let (terminal, observed, _) = match_rules(&rules, &facts());
        assert_eq!(terminal.unwrap().rule_name, "r2");
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].rule_name, "r1");
    }

    #[test]
    fn falls_through_to_else_if_then_else_action() {
        let r = rule(
            "r1",
            leaf_branch("method", "GET", Action::Block),
            vec![leaf_branch("method", "PUT", Action::Allow)],
            Some(Action::RateLimit),
        );
        let (terminal, _, _) = match_rules(&[r], &facts());
        assert!(matches!(terminal.unwrap().action, Action::RateLimit));
    }

    #[test]
    fn no_match_and_no_else_action_yields_nothing() {
        let r = rule("r1", leaf_branch("method", "GET", Action::Block), vec![], None);
        let (terminal, observed, _) = match_rules(&[r], &facts());
        assert!(terminal.is_none());
        assert!(observed.is_empty());
    }

    #[test]
    fn rule_with_else_if_but_no_else_action_is_skipped_with_warning() {
        let malformed = rule(
            "r1",
            leaf_branch("method", "GET", Action::Block),
            vec![leaf_branch("method", "PUT", Action::Allow)],
            None,
        );
        let fallback = rule("r2", leaf_branch("method", "POST", Action::RateLimit), vec![], None);
        let (terminal, observed, warnings) = match_rules(&[malformed, fallback], &facts());
        assert_eq!(terminal.unwrap().rule_name, "r2");
        assert!(observed.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].0.contains("r1"));
    }
}
