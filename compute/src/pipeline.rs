//! Request pipeline state machine (§4.7):
//! `Received -> ConfigLoaded -> Matched?` fork, `NoMatch -> Forward` or
//! `Matched -> FingerprintComputed -> CounterQueried -> Dispatched ->
//! HeadersApplied -> Emit`. Any failure before `Dispatched` forwards the
//! original request unchanged (fail-open, §7).

use crate::dispatcher::{self, DispatchContext};
use crate::{config, counter_store, logging::GatewayLog, request_facts};
use edgegate_core::model::Ruleset;
use edgegate_core::{counter_key, matcher};
use fastly::{Request, Response};
use std::time::Instant;

/// Runs one request through the whole pipeline. `store` is `None` when the
/// counter KV store could not be opened, which degrades every match to
/// fail-open forwarding (`CounterStoreFailure`, §7).
pub fn run(mut req: Request, ruleset: &Ruleset, store: Option<&fastly::kv_store::KVStore>, start_time: Instant) -> Response {
    let mut log = GatewayLog::new(&req, start_time);
    let facts = request_facts::build(&mut req);

    let (terminal, observed, warnings) = matcher::match_rules(&ruleset.rules, &facts);
    for w in &warnings {
        println!("warning: rule evaluation: {}", w.0);
    }
    log.set_observed(&observed);

    // §4.3 step 5: a terminal rule always wins. Absent one, the last
    // recorded log/simulate match is the effective decision — it still
    // goes through the counter and dispatcher rather than being dropped
    // as "no match".
    let rule_match = match terminal {
        Some(rule_match) => rule_match,
        None => match observed.into_iter().last() {
            Some(rule_match) => rule_match,
            None => {
                log.set_final_action("forwarded");
                let response = forward(req);
                log.add_response(&response);
                log.finalize();
                emit(&mut log);
                return response;
            }
        },
    };

    let Some(rule) = ruleset.rules.iter().find(|r| r.name == rule_match.rule_name) else {
        log.set_final_action("forwarded");
        let response = forward(req);
        log.add_response(&response);
        log.finalize();
        emit(&mut log);
        return response;
    };

    let Some(store) = store else {
        println!("warning: counter store unavailable, failing open");
        log.set_final_action("forwarded_counter_store_unavailable");
        let response = forward(req);
        log.add_response(&response);
        log.finalize();
        emit(&mut log);
        return response;
    };

    let client_identifier = counter_key::build(rule, &facts);
    let now_ms = chrono::Utc::now().timestamp_millis();
    let outcome = match counter_store::apply(
        store,
        &client_identifier,
        now_ms,
        rule.rate_limit.limit,
        rule.rate_limit.period,
        config::counter_store_max_retries(),
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("warning: counter store failure, failing open: {e}");
            log.set_final_action("forwarded_counter_store_failure");
            let response = forward(req);
            log.add_response(&response);
            log.finalize();
            emit(&mut log);
            return response;
        }
    };

    log.set_match(&rule.name, rule_match.action.name(), &client_identifier, outcome.allowed);

    let accepts_html = facts
        .headers
        .get("accept")
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    let ctx = DispatchContext {
        action: &rule_match.action,
        outcome: &outcome,
        rule_limit: rule.rate_limit.limit,
        rule_period: rule.rate_limit.period,
        client_identifier: &client_identifier,
        accepts_html,
    };
    let response = dispatcher::dispatch(&ctx, req, forward);

    log.set_final_action(if outcome.allowed { "allowed" } else { "denied" });
    log.add_response(&response);
    log.finalize();
    emit(&mut log);
    response
}

fn forward(req: Request) -> Response {
    match req.send(config::ORIGIN_BACKEND) {
        Ok(response) => response,
        Err(e) => {
            println!("warning: origin forward failed: {e}");
            Response::from_status(fastly::http::StatusCode::INTERNAL_SERVER_ERROR).with_body_text_plain("origin unavailable")
        }
    }
}

fn emit(log: &mut GatewayLog) {
    use std::io::Write;
    let mut endpoint = fastly::log::Endpoint::from_name(config::LOG_ENDPOINT_NAME);
    if let Ok(json) = serde_json::to_string(log) {
        let _ = writeln!(endpoint, "{json}");
    }
}
