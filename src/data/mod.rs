//! Rate-limited, cached, de-duplicated access to provider HTTP APIs
//!
//! Every provider call in the crate funnels through [`DataAccess::request`],
//! which enforces per-provider pacing, joins concurrent identical requests,
//! caches successful responses for a TTL and retries rate-limit responses
//! with exponential backoff. A provider-declared hard-quota error is served
//! from stale cache when possible: staleness beats total failure for that
//! class of error only.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Caching and pacing parameters for one request
#[derive(Debug, Clone, Copy)]
pub struct RequestPolicy {
    /// How long a successful response stays fresh
    pub cache_ttl: Duration,
    /// Minimum spacing between calls to the same provider
    pub min_interval: Duration,
    /// Retries on rate-limit responses before giving up
    pub max_retries: u32,
}

impl RequestPolicy {
    pub fn new(cache_ttl_ms: u64, min_interval_ms: u64, max_retries: u32) -> Self {
        Self {
            cache_ttl: Duration::from_millis(cache_ttl_ms),
            min_interval: Duration::from_millis(min_interval_ms),
            max_retries,
        }
    }
}

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() <= self.ttl
    }
}

/// Cloneable failure surface broadcast to de-duplicated followers
#[derive(Debug, Clone)]
enum FetchFailure {
    RateLimited,
    QuotaExhausted(String),
    Other(String),
}

impl From<FetchFailure> for Error {
    fn from(f: FetchFailure) -> Self {
        match f {
            FetchFailure::RateLimited => Error::RateLimited {
                retry_after_ms: None,
            },
            FetchFailure::QuotaExhausted(msg) => Error::QuotaExhausted(msg),
            FetchFailure::Other(msg) => Error::Provider(msg),
        }
    }
}

type FetchOutcome = std::result::Result<Value, FetchFailure>;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 30_000;

/// Shared request executor for all provider adapters
pub struct DataAccess {
    cache: DashMap<String, CacheEntry>,
    inflight: Mutex<HashMap<String, watch::Receiver<Option<FetchOutcome>>>>,
    last_call: DashMap<String, Instant>,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl DataAccess {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            inflight: Mutex::new(HashMap::new()),
            last_call: DashMap::new(),
            backoff_base: Duration::from_millis(BACKOFF_BASE_MS),
            backoff_cap: Duration::from_millis(BACKOFF_CAP_MS),
        }
    }

    /// Execute a request, or satisfy it from cache / an identical in-flight call.
    ///
    /// `provider` keys the pacing clock, `key` identifies the logical request
    /// for caching and de-duplication.
    pub async fn request<F, Fut>(
        &self,
        provider: &str,
        key: &str,
        policy: RequestPolicy,
        fetch: F,
    ) -> Result<Value>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(entry) = self.cache.get(key) {
            if entry.is_fresh() {
                debug!(key, "cache hit");
                return Ok(entry.value.clone());
            }
        }

        // Join an identical in-flight request instead of issuing a duplicate call.
        let tx = {
            let mut inflight = self.inflight.lock().await;
            if let Some(rx) = inflight.get(key) {
                let mut rx = rx.clone();
                drop(inflight);
                debug!(key, "joining in-flight request");
                return Self::await_leader(&mut rx).await;
            }
            let (tx, rx) = watch::channel(None);
            inflight.insert(key.to_string(), rx);
            tx
        };

        let outcome = self.fetch_paced(provider, key, policy, fetch).await;

        self.inflight.lock().await.remove(key);
        let _ = tx.send(Some(outcome.clone()));

        outcome.map_err(Error::from)
    }

    /// Number of cached responses, fresh or stale.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    async fn await_leader(rx: &mut watch::Receiver<Option<FetchOutcome>>) -> Result<Value> {
        loop {
            let settled = rx.borrow().clone();
            if let Some(outcome) = settled {
                return outcome.map_err(Error::from);
            }
            if rx.changed().await.is_err() {
                return Err(Error::Internal("in-flight request abandoned".to_string()));
            }
        }
    }

    async fn fetch_paced<F, Fut>(
        &self,
        provider: &str,
        key: &str,
        policy: RequestPolicy,
        fetch: F,
    ) -> FetchOutcome
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        self.pace(provider, policy.min_interval).await;

        let mut backoff = ExponentialBackoff {
            initial_interval: self.backoff_base,
            max_interval: self.backoff_cap,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        let mut attempt: u32 = 0;

        loop {
            self.last_call.insert(provider.to_string(), Instant::now());

            match fetch().await {
                Ok(value) => {
                    self.cache.insert(
                        key.to_string(),
                        CacheEntry {
                            value: value.clone(),
                            stored_at: Instant::now(),
                            ttl: policy.cache_ttl,
                        },
                    );
                    return Ok(value);
                }
                Err(Error::RateLimited { retry_after_ms }) if attempt < policy.max_retries => {
                    attempt += 1;
                    let delay = retry_after_ms
                        .map(Duration::from_millis)
                        .or_else(|| backoff.next_backoff())
                        .unwrap_or(self.backoff_cap)
                        .min(self.backoff_cap);
                    warn!(
                        provider,
                        key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(Error::RateLimited { .. }) => {
                    warn!(provider, key, "rate limit retries exhausted");
                    return Err(FetchFailure::RateLimited);
                }
                Err(Error::QuotaExhausted(msg)) => {
                    // Hard quota cannot be retried; prefer a stale cached value.
                    if let Some(entry) = self.cache.get(key) {
                        warn!(provider, key, "quota exhausted, serving stale cache");
                        return Ok(entry.value.clone());
                    }
                    return Err(FetchFailure::QuotaExhausted(msg));
                }
                Err(e) => return Err(FetchFailure::Other(e.to_string())),
            }
        }
    }

    async fn pace(&self, provider: &str, min_interval: Duration) {
        if min_interval.is_zero() {
            return;
        }
        let last = self.last_call.get(provider).map(|entry| *entry.value());
        if let Some(last) = last {
            if let Some(wait) = min_interval.checked_sub(last.elapsed()) {
                if !wait.is_zero() {
                    debug!(provider, wait_ms = wait.as_millis() as u64, "pacing request");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

impl Default for DataAccess {
    fn default() -> Self {
        Self::new()
    }
}
