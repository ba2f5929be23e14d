//! `GET <RATE_LIMIT_INFO_PATH>` (§6): reports the caller's current window
//! state for whichever rule would match it, without mutating the counter.

use crate::counter_store;
use chrono::{TimeZone, Utc};
use edgegate_core::facts::RequestFacts;
use edgegate_core::model::Ruleset;
use edgegate_core::{counter_key, matcher};
use fastly::kv_store::KVStore;
use fastly::http::StatusCode;
use fastly::Response;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    limit: u32,
    remaining: u32,
    reset: i64,
    reset_formatted: String,
    period: u32,
}

pub fn handle(ruleset: &Ruleset, facts: &RequestFacts, store: &KVStore, now_ms: i64, accepts_html: bool) -> Response {
    let (terminal, _observed, _warnings) = matcher::match_rules(&ruleset.rules, facts);

    let Some(rule_match) = terminal else {
        return no_rule_response(accepts_html);
    };

    let Some(rule) = ruleset.rules.iter().find(|r| r.name == rule_match.rule_name) else {
        return no_rule_response(accepts_html);
    };

    let key = counter_key::build(rule, facts);
    let outcome = match counter_store::peek(store, &key, now_ms, rule.rate_limit.limit, rule.rate_limit.period) {
        Ok(o) => o,
        Err(e) => {
            println!("warning: introspection counter peek failed: {e}");
            return Response::from_status(StatusCode::INTERNAL_SERVER_ERROR).with_body_text_plain("unavailable");
        }
    };

    let reset_formatted = Utc
        .timestamp_millis_opt(outcome.reset_time)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();

    let info = InfoResponse {
        limit: rule.rate_limit.limit,
        remaining: outcome.remaining,
        reset: outcome.reset_time / 1000,
        reset_formatted,
        period: rule.rate_limit.period,
    };

    render(&info, accepts_html)
}

fn no_rule_response(accepts_html: bool) -> Response {
    let info = InfoResponse { limit: 0, remaining: 0, reset: 0, reset_formatted: String::new(), period: 0 };
    render(&info, accepts_html)
}

fn render(info: &InfoResponse, accepts_html: bool) -> Response {
    if accepts_html {
        Response::from_status(StatusCode::OK).with_body_text_html(&format!(
            "<html><body><p>limit: {}</p><p>remaining: {}</p><p>reset: {}</p><p>period: {}</p></body></html>",
            info.limit, info.remaining, info.reset_formatted, info.period
        ))
    } else {
        Response::from_status(StatusCode::OK)
            .with_body_json(info)
            .unwrap_or_else(|_| Response::from_status(StatusCode::INTERNAL_SERVER_ERROR))
    }
}
