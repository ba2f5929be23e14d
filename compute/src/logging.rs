//! Structured security/audit logging (§7). Operational trace goes through
//! `println!` (captured by Fastly as stdout logs); the decision itself is
//! additionally recorded as a JSON line on a named `fastly::log::Endpoint`,
//! carrying a UUIDv7 request id, a timestamp, and the counter verdict.

use chrono::Utc;
use fastly::{Request, Response};
use serde::Serialize;
use std::time::Instant;
use uuid::{timestamp::Timestamp, NoContext, Uuid};

/// A non-terminal (`log`/`simulate`) match recorded while the walk
/// continued past it, kept in the log record even when a later rule's
/// terminal action is what actually got dispatched.
#[derive(Serialize)]
pub struct ObservedMatch {
    pub rule_name: String,
    pub action: String,
}

#[derive(Serialize)]
pub struct GatewayLog {
    pub request_id: String,
    pub timestamp: String,
    pub processing_time_ms: u64,
    pub method: String,
    pub url: String,
    pub client_identifier: String,
    pub matched_rule: Option<String>,
    pub action: Option<String>,
    pub allowed: Option<bool>,
    pub observed_matches: Vec<ObservedMatch>,
    pub final_action: String,
    pub response_status: Option<u16>,
    #[serde(skip)]
    start_time: Instant,
}

impl GatewayLog {
    pub fn new(req: &Request, start_time: Instant) -> Self {
        let now = Utc::now();
        let ts = Timestamp::from_unix(NoContext, now.timestamp() as u64, now.timestamp_subsec_nanos());
        let uuid = Uuid::new_v7(ts);

        GatewayLog {
            request_id: uuid.to_string(),
            timestamp: now.to_rfc3339(),
            processing_time_ms: 0,
            start_time,
            method: req.get_method_str().to_string(),
            url: req.get_url_str().to_string(),
            client_identifier: String::new(),
            matched_rule: None,
            action: None,
            allowed: None,
            observed_matches: Vec::new(),
            final_action: "initializing".to_string(),
            response_status: None,
        }
    }

    pub fn set_match(&mut self, rule_name: &str, action: &str, client_identifier: &str, allowed: bool) {
        self.matched_rule = Some(rule_name.to_string());
        self.action = Some(action.to_string());
        self.client_identifier = client_identifier.to_string();
        self.allowed = Some(allowed);
    }

    /// Record every observational (`log`/`simulate`) match the walk passed
    /// over, regardless of whether a later terminal rule is what actually
    /// got dispatched (§8 scenario 3).
    pub fn set_observed(&mut self, observed: &[edgegate_core::RuleMatch]) {
        self.observed_matches = observed
            .iter()
            .map(|m| ObservedMatch { rule_name: m.rule_name.clone(), action: m.action.name().to_string() })
            .collect();
    }

    pub fn set_final_action(&mut self, action: &str) {
        self.final_action = action.to_string();
    }

    pub fn add_response(&mut self, resp: &Response) {
        self.response_status = Some(resp.get_status().as_u16());
    }

    pub fn finalize(&mut self) {
        self.processing_time_ms = self.start_time.elapsed().as_millis() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_a_match() {
        let req = Request::get("https://example.com/widgets");
        let mut log = GatewayLog::new(&req, Instant::now());
        log.set_final_action("forwarded");
        log.finalize();
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.contains("\"final_action\":\"forwarded\""));
        assert!(json.contains("\"matched_rule\":null"));
    }

    #[test]
    fn records_a_match_and_verdict() {
        let req = Request::get("https://example.com/api/login");
        let mut log = GatewayLog::new(&req, Instant::now());
        log.set_match("login-burst", "block", "fp:abc", false);
        log.set_final_action("blocked");
        log.finalize();
        assert_eq!(log.matched_rule.as_deref(), Some("login-burst"));
        assert_eq!(log.allowed, Some(false));
    }
}
