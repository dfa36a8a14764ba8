//! Birdeye API adapter (primary, credentialed provider)
//!
//! Discovery ranks the day's most traded tokens; metrics combine the
//! overview, security and OHLCV endpoints. A missing API key leaves the
//! adapter unconfigured and the failover controller skips it entirely.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::BirdeyeConfig;
use crate::data::{DataAccess, RequestPolicy};
use crate::error::{Error, Result};

use super::types::{Candle, SeedToken, TokenMetrics, TokenSecurity};
use super::MarketDataProvider;

/// 15-minute bars, matching the volume gate window
const OHLCV_RESOLUTION: &str = "15m";
const OHLCV_SPAN_SECS: i64 = 24 * 3600;

#[derive(Debug, Clone, Deserialize)]
struct TokenListResponse {
    data: Option<TokenListData>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenListData {
    tokens: Option<Vec<TokenListEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenListEntry {
    address: String,
    name: Option<String>,
    symbol: Option<String>,
    decimals: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
struct OverviewResponse {
    data: Option<OverviewData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverviewData {
    liquidity: Option<f64>,
    #[serde(rename = "v24hUSD")]
    v24h_usd: Option<f64>,
    decimals: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
struct SecurityResponse {
    data: Option<SecurityData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecurityData {
    is_scam: Option<bool>,
    is_honeypot: Option<bool>,
    mintable: Option<bool>,
    freezeable: Option<bool>,
    owner_change_allowed: Option<bool>,
    high_tax: Option<bool>,
    lp_unlocked: Option<bool>,
    mint_authority: Option<String>,
    freeze_authority: Option<String>,
    #[serde(rename = "top10HolderPercent")]
    top10_holder_percent: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct OhlcvResponse {
    data: Option<OhlcvData>,
}

#[derive(Debug, Clone, Deserialize)]
struct OhlcvData {
    items: Option<Vec<OhlcvItem>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OhlcvItem {
    #[serde(rename = "unixTime")]
    unix_time: i64,
    o: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    c: Option<f64>,
    v: Option<f64>,
    #[serde(rename = "vUsd")]
    v_usd: Option<f64>,
}

pub struct BirdeyeProvider {
    http: reqwest::Client,
    access: Arc<DataAccess>,
    config: BirdeyeConfig,
}

impl BirdeyeProvider {
    pub fn new(config: BirdeyeConfig, access: Arc<DataAccess>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            access,
            config,
        }
    }

    fn policy(&self) -> RequestPolicy {
        RequestPolicy::new(
            self.config.cache_ttl_ms,
            self.config.min_interval_ms,
            self.config.max_retries,
        )
    }

    async fn get(&self, path_and_query: &str) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, path_and_query);
        let http = self.http.clone();
        let api_key = self.config.api_key.clone();
        let key = format!("birdeye:{}", path_and_query);

        self.access
            .request("birdeye", &key, self.policy(), move || {
                let http = http.clone();
                let url = url.clone();
                let api_key = api_key.clone();
                async move {
                    let resp = http
                        .get(&url)
                        .header("X-API-KEY", api_key)
                        .header("x-chain", "solana")
                        .send()
                        .await?;
                    super::read_json(resp).await
                }
            })
            .await
    }

    async fn fetch_overview(&self, address: &str) -> Result<Option<OverviewData>> {
        let value = self
            .get(&format!("/defi/token_overview?address={}", address))
            .await?;
        let parsed: OverviewResponse = serde_json::from_value(value)?;
        Ok(parsed.data)
    }

    async fn fetch_security(&self, address: &str) -> Result<Option<SecurityData>> {
        let value = self
            .get(&format!("/defi/token_security?address={}", address))
            .await?;
        let parsed: SecurityResponse = serde_json::from_value(value)?;
        Ok(parsed.data)
    }

    async fn fetch_ohlcv(&self, address: &str) -> Result<Vec<Candle>> {
        let now = Utc::now().timestamp();
        let value = self
            .get(&format!(
                "/defi/ohlcv?address={}&type={}&time_from={}&time_to={}",
                address,
                OHLCV_RESOLUTION,
                now - OHLCV_SPAN_SECS,
                now
            ))
            .await?;
        let parsed: OhlcvResponse = serde_json::from_value(value)?;

        let mut candles: Vec<Candle> = parsed
            .data
            .and_then(|d| d.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(item_to_candle)
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

fn item_to_candle(item: OhlcvItem) -> Option<Candle> {
    Some(Candle {
        timestamp: item.unix_time,
        open: item.o?,
        high: item.h?,
        low: item.l?,
        close: item.c?,
        volume: item.v_usd.or(item.v)?,
    })
}

fn security_to_normalized(data: &SecurityData) -> TokenSecurity {
    TokenSecurity {
        is_scam: data.is_scam,
        is_honeypot: data.is_honeypot,
        is_mintable: data.mintable,
        is_freezeable: data.freezeable,
        owner_can_change: data.owner_change_allowed,
        high_tax: data.high_tax,
        lp_unlocked: data.lp_unlocked,
        has_mint_authority: data.mint_authority.as_ref().map(|a| !a.is_empty()),
        has_freeze_authority: data.freeze_authority.as_ref().map(|a| !a.is_empty()),
    }
}

#[async_trait]
impl MarketDataProvider for BirdeyeProvider {
    fn name(&self) -> &'static str {
        "birdeye"
    }

    fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn discover(&self, limit: usize) -> Result<Vec<SeedToken>> {
        let value = self
            .get(&format!(
                "/defi/tokenlist?sort_by=v24hUSD&sort_type=desc&offset=0&limit={}",
                limit
            ))
            .await?;
        let parsed: TokenListResponse = serde_json::from_value(value)?;

        let seeds = parsed
            .data
            .and_then(|d| d.tokens)
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .map(|t| SeedToken {
                name: t.name.unwrap_or_else(|| "Unknown".to_string()),
                symbol: t.symbol.unwrap_or_else(|| "???".to_string()),
                decimals: t.decimals,
                address: t.address,
            })
            .collect();
        Ok(seeds)
    }

    async fn fetch_metrics(&self, address: &str) -> Result<TokenMetrics> {
        let mut metrics = TokenMetrics::new();

        // Each endpoint failing on its own leaves the affected metric absent
        // rather than aborting the candidate; hard-quota errors still bubble
        // up so the failover controller can react.
        match self.fetch_overview(address).await {
            Ok(Some(overview)) => {
                metrics.liquidity_usd = overview.liquidity;
                metrics.vol24h_usd = overview.v24h_usd;
                metrics.decimals = overview.decimals;
            }
            Ok(None) => return Err(Error::UnknownMint(address.to_string())),
            Err(e) if e.is_quota_exhausted() => return Err(e),
            Err(e) => warn!(address, error = %e, "overview fetch failed"),
        }

        match self.fetch_security(address).await {
            Ok(Some(security)) => {
                metrics.holders_pct = security.top10_holder_percent;
                metrics.security = security_to_normalized(&security);
            }
            Ok(None) => debug!(address, "no security data"),
            Err(e) if e.is_quota_exhausted() => return Err(e),
            Err(Error::Provider(msg)) if msg.contains("404") => {
                // Endpoint not served by this plan/RPC: holder data is
                // unobtainable rather than merely missing.
                metrics.holders_supported = false;
            }
            Err(e) => warn!(address, error = %e, "security fetch failed"),
        }

        match self.fetch_ohlcv(address).await {
            Ok(candles) => {
                metrics.vol15m_usd = candles.last().map(|c| c.volume);
                metrics.candles = candles;
            }
            Err(e) if e.is_quota_exhausted() => return Err(e),
            Err(e) => warn!(address, error = %e, "ohlcv fetch failed"),
        }

        Ok(metrics)
    }

    async fn recent_candles(&self, address: &str, bars: usize) -> Result<Vec<Candle>> {
        let mut candles = self.fetch_ohlcv(address).await?;
        if candles.len() > bars {
            candles.drain(..candles.len() - bars);
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokenlist_parsing() {
        let raw = json!({
            "data": {
                "tokens": [
                    {"address": "MintA", "name": "Alpha", "symbol": "ALP", "decimals": 6},
                    {"address": "MintB", "name": null, "symbol": null}
                ]
            },
            "success": true
        });
        let parsed: TokenListResponse = serde_json::from_value(raw).unwrap();
        let tokens = parsed.data.unwrap().tokens.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].address, "MintA");
        assert_eq!(tokens[1].name, None);
    }

    #[test]
    fn test_security_normalization() {
        let data = SecurityData {
            is_scam: Some(false),
            is_honeypot: None,
            mintable: Some(true),
            freezeable: None,
            owner_change_allowed: None,
            high_tax: None,
            lp_unlocked: None,
            mint_authority: Some("Auth111".to_string()),
            freeze_authority: Some(String::new()),
            top10_holder_percent: Some(42.5),
        };
        let normalized = security_to_normalized(&data);
        assert_eq!(normalized.is_mintable, Some(true));
        assert_eq!(normalized.has_mint_authority, Some(true));
        assert_eq!(normalized.has_freeze_authority, Some(false));
        // Mintable alone is a risk weight, not a hard stop.
        assert!(!normalized.has_hard_stop());
        assert!(normalized.has_authority());
    }

    #[test]
    fn test_ohlcv_item_requires_prices() {
        let full = OhlcvItem {
            unix_time: 100,
            o: Some(1.0),
            h: Some(2.0),
            l: Some(0.5),
            c: Some(1.5),
            v: Some(10.0),
            v_usd: Some(20.0),
        };
        let candle = item_to_candle(full).unwrap();
        assert_eq!(candle.volume, 20.0);

        let partial = OhlcvItem {
            unix_time: 100,
            o: Some(1.0),
            h: None,
            l: Some(0.5),
            c: Some(1.5),
            v: None,
            v_usd: None,
        };
        assert!(item_to_candle(partial).is_none());
    }
}
