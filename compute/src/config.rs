//! Environment-driven configuration (§6). Compute@Edge binaries have no
//! config-file framework available to them: env vars and edge dictionaries
//! are the only inputs, so every tunable here is read through `std::env`.

/// Name of the `fastly::ConfigStore` backing the ruleset.
pub const CONFIG_STORE_NAME: &str = "rate_limit_rules";

/// Name of the `fastly::kv_store::KVStore` backing sliding-window counters.
pub const COUNTER_STORE_NAME: &str = "rate_limit_counters";

/// Origin backend name requests are forwarded to.
pub const ORIGIN_BACKEND: &str = "origin";

/// Security/audit log endpoint name.
pub const LOG_ENDPOINT_NAME: &str = "rate_limit_logs";

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// How long a config snapshot may be served before a refresh is attempted
/// (§4.6, default 60s).
pub fn config_cache_ttl_secs() -> u64 {
    env_parsed("CONFIG_CACHE_TTL", 60)
}

/// Path that serves the introspection endpoint (§6). `None` disables it,
/// which is the default — there is no implicit path.
pub fn rate_limit_info_path() -> Option<String> {
    std::env::var("RATE_LIMIT_INFO_PATH").ok().filter(|p| !p.is_empty())
}

/// Bound on compare-and-swap retries against the counter store before a
/// request is treated as a `CounterStoreFailure` (§7) and allowed through.
pub fn counter_store_max_retries() -> u32 {
    env_parsed("COUNTER_STORE_MAX_RETRIES", 3)
}
