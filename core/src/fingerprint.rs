//! Deterministic client fingerprinting (§4.1): SHA-256 over the resolved
//! values of a rule's configured parameter list, joined by `|`.

use crate::facts::RequestFacts;
use sha2::{Digest, Sha256};

/// Compute the fingerprint for `parameters` against `facts`. Unknown or
/// unresolvable parameters resolve to an empty string rather than
/// shortening the joined value, so the hash stays parameter-count stable.
pub fn compute(parameters: &[String], facts: &RequestFacts) -> String {
    let joined = parameters
        .iter()
        .map(|p| resolve_parameter(p, facts))
        .collect::<Vec<_>>()
        .join("|");
    let digest = Sha256::digest(joined.as_bytes());
    hex::encode(digest)
}

fn resolve_parameter(name: &str, facts: &RequestFacts) -> String {
    if let Some(rest) = name.strip_prefix("headers.nameValue:") {
        let mut parts = rest.splitn(2, ':');
        let header_name = parts.next().unwrap_or_default();
        let expected = parts.next().unwrap_or_default();
        return facts.header_name_value(header_name, expected);
    }
    if let Some(cookie_name) = name.strip_prefix("headers.cookieName:") {
        return facts.cookie(cookie_name).unwrap_or_default().to_string();
    }
    facts.resolve(name).unwrap_or_default()
}
