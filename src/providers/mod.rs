//! Market-data provider adapters
//!
//! Each adapter turns one provider's raw payloads into the normalized types
//! in [`types`], routing every network call through the shared
//! [`crate::data::DataAccess`] executor.

pub mod birdeye;
pub mod failover;
pub mod gecko;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

pub use birdeye::BirdeyeProvider;
pub use failover::FailoverController;
pub use gecko::GeckoProvider;
pub use types::{Candle, SeedToken, TokenMetrics, TokenSecurity};

/// A source of tradable-token discovery and per-token metrics
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the adapter has the credentials it needs
    fn is_configured(&self) -> bool {
        true
    }

    /// Surface up to `limit` seed tokens worth evaluating
    async fn discover(&self, limit: usize) -> Result<Vec<SeedToken>>;

    /// Fetch normalized metrics for one token; partial data is tolerated
    async fn fetch_metrics(&self, address: &str) -> Result<TokenMetrics>;

    /// Fresh candle history for re-checking a trend mid-position
    async fn recent_candles(&self, address: &str, bars: usize) -> Result<Vec<Candle>>;
}

/// Classify an HTTP response shared by all adapters: 429 becomes a
/// retryable rate-limit (honoring Retry-After), quota-exhaustion messages
/// become the non-retryable hard-quota error, everything else surfaces the
/// body as a provider error.
pub(crate) async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        return Err(Error::RateLimited { retry_after_ms });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        if is_quota_message(&body) {
            return Err(Error::QuotaExhausted(truncate(&body, 200)));
        }
        return Err(Error::Provider(format!(
            "HTTP {}: {}",
            status,
            truncate(&body, 200)
        )));
    }

    let value: Value = resp.json().await?;

    // Some providers report quota exhaustion inside a 200 body.
    if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
        if is_quota_message(message) {
            return Err(Error::QuotaExhausted(message.to_string()));
        }
    }

    Ok(value)
}

fn is_quota_message(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("compute unit") || lower.contains("quota") || lower.contains("exceeded the")
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_message_detection() {
        assert!(is_quota_message("Compute Units exceeded for this billing cycle"));
        assert!(is_quota_message("monthly quota reached"));
        assert!(!is_quota_message("internal server error"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 200), "short");
        let long = "x".repeat(300);
        assert_eq!(truncate(&long, 200).len(), 203);
    }
}
