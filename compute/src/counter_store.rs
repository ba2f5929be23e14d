//! KV-backed sliding-window counter persistence (§4.4/§5/§9).
//!
//! Each `CounterKey` is a single row holding its timestamp list. Writes use
//! `insert(...).if_generation_match(generation)` so a concurrent writer's
//! stale write is rejected rather than silently lost — compare-and-swap,
//! option (c) of §9's three single-writer strategies. On a generation
//! conflict the row is re-read and the window recomputed against the fresh
//! list; this is retried a bounded number of times before giving up.

use edgegate_core::window::{self, WindowOutcome};
use fastly::kv_store::{InsertMode, KVStore, KVStoreError};

#[derive(Debug, thiserror::Error)]
pub enum CounterStoreError {
    #[error("counter store `{0}` is not configured")]
    StoreNotFound(String),
    #[error("kv store error: {0}")]
    Kv(#[from] KVStoreError),
    #[error("exhausted {0} compare-and-swap retries")]
    RetriesExhausted(u32),
}

/// Apply one request against the counter identified by `key`, persisting
/// the updated window with compare-and-swap. Returns the sliding-window
/// verdict; on a `CounterStoreError` the caller fails open (§7).
pub fn apply(
    store: &KVStore,
    key: &str,
    now_ms: i64,
    limit: u32,
    period_secs: u32,
    max_retries: u32,
) -> Result<WindowOutcome, CounterStoreError> {
    for _ in 0..=max_retries {
        let (existing, generation) = read(store, key)?;
        let outcome = window::apply(&existing, now_ms, limit, period_secs);
        let payload = serde_json::to_string(&outcome.new_list).unwrap_or_else(|_| "[]".to_string());

        let result = store
            .build_insert()
            .mode(InsertMode::Overwrite)
            .if_generation_match(generation)
            .execute(key, payload);

        match result {
            Ok(()) => return Ok(outcome),
            Err(KVStoreError::ItemPreconditionFailed) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(CounterStoreError::RetriesExhausted(max_retries))
}

/// Read-only peek at a counter's current window, without mutating it
/// (used by the introspection endpoint — §6).
pub fn peek(store: &KVStore, key: &str, now_ms: i64, limit: u32, period_secs: u32) -> Result<WindowOutcome, CounterStoreError> {
    let (existing, _generation) = read(store, key)?;
    let period_ms = i64::from(period_secs) * 1000;
    let survivors: Vec<i64> = existing.into_iter().filter(|ts| now_ms - ts < period_ms).collect();
    let remaining = limit.saturating_sub(survivors.len() as u32);
    let reset_time = survivors.first().copied().map(|oldest| oldest + period_ms).unwrap_or(now_ms + period_ms);
    Ok(WindowOutcome { allowed: remaining > 0, remaining, reset_time, retry_after: None, new_list: survivors })
}

/// On a missing key, returns an empty list with generation `0` so the
/// first insert for a fresh counter is an unconditional create.
fn read(store: &KVStore, key: &str) -> Result<(Vec<i64>, u64), CounterStoreError> {
    match store.lookup(key) {
        Ok(mut response) => {
            let bytes = response.take_body_bytes();
            let list: Vec<i64> = serde_json::from_slice(&bytes).unwrap_or_default();
            Ok((list, response.current_generation()))
        }
        Err(KVStoreError::ItemNotFound) => Ok((Vec::new(), 0)),
        Err(e) => Err(e.into()),
    }
}

pub fn open(name: &str) -> Result<KVStore, CounterStoreError> {
    KVStore::open(name)
        .map_err(CounterStoreError::from)?
        .ok_or_else(|| CounterStoreError::StoreNotFound(name.to_string()))
}
