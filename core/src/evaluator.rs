//! Recursive condition evaluation (§4.2). Fails closed: a structurally
//! broken leaf (unknown field, unknown operator, bad regex) evaluates to
//! `false` and produces a [`Warning`] rather than propagating an error.

use crate::facts::RequestFacts;
use crate::model::{ConditionNode, GroupCondition, LeafCondition, Logic, Operator};
use regex::Regex;
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning(pub String);

/// Evaluate an ordered list of condition nodes combined by `logic`,
/// short-circuiting on the first decisive result.
pub fn evaluate_all(nodes: &[ConditionNode], logic: Logic, facts: &RequestFacts) -> (bool, Vec<Warning>) {
    let mut warnings = Vec::new();
    let result = match logic {
        Logic::And => nodes.iter().all(|n| {
            let (matched, w) = evaluate_node(n, facts);
            warnings.extend(w);
            matched
        }),
        Logic::Or => nodes.iter().any(|n| {
            let (matched, w) = evaluate_node(n, facts);
            warnings.extend(w);
            matched
        }),
    };
    (result, warnings)
}

fn evaluate_node(node: &ConditionNode, facts: &RequestFacts) -> (bool, Vec<Warning>) {
    match node {
        ConditionNode::Group(GroupCondition { logic, conditions, .. }) => {
            evaluate_all(conditions, *logic, facts)
        }
        ConditionNode::Leaf(leaf) => evaluate_leaf(leaf, facts),
    }
}

fn evaluate_leaf(leaf: &LeafCondition, facts: &RequestFacts) -> (bool, Vec<Warning>) {
    let field_value = match resolve_leaf_field(leaf, facts) {
        Some(v) => v,
        None => {
            return (
                false,
                vec![Warning(format!("unknown field '{}'", leaf.field))],
            )
        }
    };

    match leaf.operator {
        Operator::Eq => eq(&leaf.field, &field_value, &leaf.value),
        Operator::Ne => {
            let (matched, w) = eq(&leaf.field, &field_value, &leaf.value);
            (!matched, w)
        }
        Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le => {
            numeric_compare(leaf.operator, &field_value, &leaf.value)
        }
        Operator::Contains => (field_value.contains(&leaf.value), vec![]),
        Operator::NotContains => (!field_value.contains(&leaf.value), vec![]),
        Operator::StartsWith => (field_value.starts_with(&leaf.value), vec![]),
        Operator::EndsWith => (field_value.ends_with(&leaf.value), vec![]),
        Operator::Matches => match Regex::new(&leaf.value) {
            Ok(re) => (re.is_match(&field_value), vec![]),
            Err(e) => (
                false,
                vec![Warning(format!("invalid regex '{}': {e}", leaf.value))],
            ),
        },
    }
}

fn resolve_leaf_field(leaf: &LeafCondition, facts: &RequestFacts) -> Option<String> {
    if leaf.field == "headers.nameValue" {
        let name = leaf.header_name.as_deref()?;
        let expected = leaf.header_value.as_deref().unwrap_or_default();
        return Some(facts.header_name_value(name, expected));
    }
    if leaf.field == "headers.cookieName" {
        let name = leaf.cookie_name.as_deref()?;
        return Some(if facts.cookie(name).is_some() { "true".to_string() } else { String::new() });
    }
    if leaf.field == "headers.cookieNameValue" {
        let name = leaf.cookie_name.as_deref()?;
        let actual = facts.cookie(name).unwrap_or_default();
        return Some(if actual == leaf.value { "true".to_string() } else { String::new() });
    }
    facts.resolve(&leaf.field)
}

/// `eq`/`ne` semantics: on `clientIP` with a CIDR operand (`x/y`), `eq`
/// performs CIDR-membership (IPv4 only per §9); otherwise strict equality.
fn eq(field: &str, field_value: &str, operand: &str) -> (bool, Vec<Warning>) {
    if field == "clientIP" && operand.contains('/') {
        return match (Ipv4Addr::from_str(field_value), ipnet::Ipv4Net::from_str(operand)) {
            (Ok(ip), Ok(net)) => (net.contains(&ip), vec![]),
            _ => (false, vec![Warning(format!("invalid IPv4/CIDR comparison: {field_value} vs {operand}"))]),
        };
    }
    (field_value == operand, vec![])
}

fn numeric_compare(operator: Operator, field_value: &str, operand: &str) -> (bool, Vec<Warning>) {
    let (a, b) = match (field_value.trim().parse::<f64>(), operand.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) if a.is_finite() && b.is_finite() => (a, b),
        _ => {
            return (
                false,
                vec![Warning(format!(
                    "non-numeric comparison: '{field_value}' vs '{operand}'"
                ))],
            )
        }
    };
    let result = match operator {
        Operator::Gt => a > b,
        Operator::Ge => a >= b,
        Operator::Lt => a < b,
        Operator::Le => a <= b,
        _ => unreachable!(),
    };
    (result, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LeafCondition;
    use std::collections::HashMap;

    fn facts_with_ip(ip: &str) -> RequestFacts {
        let mut headers = HashMap::new();
        headers.insert("true-client-ip".to_string(), ip.to_string());
        RequestFacts {
            method: "GET".to_string(),
            url: "https://example.com/".to_string(),
            headers,
            cookies: HashMap::new(),
            cf: serde_json::json!({}),
            body: vec![],
            edge_client_ip: None,
        }
    }

    fn leaf(field: &str, operator: Operator, value: &str) -> LeafCondition {
        LeafCondition {
            field: field.to_string(),
            operator,
            value: value.to_string(),
            header_name: None,
            header_value: None,
            cookie_name: None,
        }
    }

    #[test]
    fn cidr_eq_matches_within_range() {
        let f = facts_with_ip("1.2.3.99");
        let (matched, _) = evaluate_leaf(&leaf("clientIP", Operator::Eq, "1.2.3.0/24"), &f);
        assert!(matched);
    }

    #[test]
    fn cidr_eq_rejects_outside_range() {
        let f = facts_with_ip("1.2.4.1");
        let (matched, _) = evaluate_leaf(&leaf("clientIP", Operator::Eq, "1.2.3.0/24"), &f);
        assert!(!matched);
    }

    #[test]
    fn unknown_operator_target_field_fails_closed() {
        let f = facts_with_ip("1.2.3.4");
        let (matched, warnings) = evaluate_leaf(&leaf("bogus", Operator::Eq, "x"), &f);
        assert!(!matched);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn invalid_regex_fails_closed_not_panic() {
        let f = facts_with_ip("1.2.3.4");
        let (matched, warnings) = evaluate_leaf(&leaf("clientIP", Operator::Matches, "("), &f);
        assert!(!matched);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn and_short_circuits_on_first_false() {
        let f = facts_with_ip("1.2.3.4");
        let nodes = vec![
            ConditionNode::Leaf(leaf("method", Operator::Eq, "POST")),
            ConditionNode::Leaf(leaf("bogus", Operator::Eq, "x")),
        ];
        let (matched, warnings) = evaluate_all(&nodes, Logic::And, &f);
        assert!(!matched);
        // Both are still evaluated by `all()`'s short circuit on the *first*
        // false; `method` fails first so `bogus` contributes no warning.
        assert!(warnings.is_empty());
    }

    #[test]
    fn or_succeeds_fast() {
        let f = facts_with_ip("1.2.3.4");
        let nodes = vec![
            ConditionNode::Leaf(leaf("clientIP", Operator::Eq, "1.2.3.4")),
            ConditionNode::Leaf(leaf("bogus", Operator::Eq, "x")),
        ];
        let (matched, warnings) = evaluate_all(&nodes, Logic::Or, &f);
        assert!(matched);
        assert!(warnings.is_empty());
    }

    #[test]
    fn numeric_gt_parses_finite_decimal() {
        let mut f = facts_with_ip("1.2.3.4");
        f.headers.insert("x-count".to_string(), "42".to_string());
        let (matched, _) = evaluate_leaf(&leaf("headers.x-count", Operator::Gt, "10"), &f);
        assert!(matched);
    }
}
