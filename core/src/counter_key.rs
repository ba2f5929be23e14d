//! Counter store key construction (§4.6). A rule keys its sliding window
//! on its fingerprint when one is configured, else on the client IP, else
//! on a single shared bucket for the whole rule.

use crate::facts::RequestFacts;
use crate::model::Rule;

pub fn build(rule: &Rule, facts: &RequestFacts) -> String {
    match &rule.fingerprint {
        Some(spec) => {
            let hash = crate::fingerprint::compute(&spec.parameters, facts);
            format!("rate_limit:{}:fingerprint:{hash}", rule.name)
        }
        None => {
            let ip = facts.client_ip();
            if ip == "unknown" {
                format!("rate_limit:{}:default", rule.name)
            } else {
                format!("rate_limit:{}:ip:{ip}", rule.name)
            }
        }
    }
}
