//! Edge HTTP rate-limiting gateway for Fastly Compute@Edge.
//!
//! Inspects each incoming request, matches it against an ordered ruleset,
//! and — when a rule matches — consults a per-identifier sliding-window
//! counter to decide whether to forward, block, log, simulate, or
//! substitute a custom response.

use edgegate::config_cache::{self, ConfigCache};
use edgegate::{config, counter_store, introspection, pipeline, request_facts};
use fastly::{Error, Request, Response};
use std::sync::OnceLock;
use std::time::Instant;

static CONFIG_CACHE: OnceLock<ConfigCache> = OnceLock::new();

#[fastly::main]
fn main(req: Request) -> Result<Response, Error> {
    let start_time = Instant::now();
    let cache = CONFIG_CACHE.get_or_init(|| ConfigCache::new(config::config_cache_ttl_secs()));

    let store = fastly::ConfigStore::open(config::CONFIG_STORE_NAME);
    let ruleset = cache.get(&store, config_cache::now_secs());

    if let Some(info_path) = config::rate_limit_info_path() {
        if req.get_path() == info_path {
            return Ok(handle_introspection(req, &ruleset));
        }
    }

    let kv_store = counter_store::open(config::COUNTER_STORE_NAME)
        .map_err(|e| {
            println!("warning: counter store unavailable: {e}");
        })
        .ok();

    Ok(pipeline::run(req, &ruleset, kv_store.as_ref(), start_time))
}

fn handle_introspection(mut req: Request, ruleset: &edgegate_core::model::Ruleset) -> Response {
    let facts = request_facts::build(&mut req);
    let accepts_html = facts
        .headers
        .get("accept")
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);
    let now_ms = chrono::Utc::now().timestamp_millis();

    match counter_store::open(config::COUNTER_STORE_NAME) {
        Ok(store) => introspection::handle(ruleset, &facts, &store, now_ms, accepts_html),
        Err(e) => {
            println!("warning: introspection counter store unavailable: {e}");
            Response::from_status(fastly::http::StatusCode::SERVICE_UNAVAILABLE).with_body_text_plain("unavailable")
        }
    }
}
