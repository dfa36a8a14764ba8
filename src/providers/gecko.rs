//! GeckoTerminal API adapter (alternate, keyless provider)
//!
//! Serves as the fallback when the primary provider is blocked or has no
//! credential. Discovery walks trending pools; metrics come from the pool
//! lookup plus 15-minute OHLCV. The API exposes no security or holder data,
//! so those fields stay unknown and the filter gates fail open on them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::GeckoConfig;
use crate::data::{DataAccess, RequestPolicy};
use crate::error::{Error, Result};

use super::types::{Candle, SeedToken, TokenMetrics};
use super::MarketDataProvider;

const NETWORK: &str = "solana";
/// 15-minute aggregation on the minute endpoint
const OHLCV_AGGREGATE: u32 = 15;
const OHLCV_LIMIT: usize = 96;

#[derive(Debug, Clone, Deserialize)]
struct PoolListResponse {
    data: Option<Vec<PoolEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolEntry {
    attributes: Option<PoolAttributes>,
    relationships: Option<PoolRelationships>,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolAttributes {
    address: Option<String>,
    name: Option<String>,
    reserve_in_usd: Option<String>,
    volume_usd: Option<VolumeUsd>,
}

#[derive(Debug, Clone, Deserialize)]
struct VolumeUsd {
    h24: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolRelationships {
    base_token: Option<RelationshipData>,
}

#[derive(Debug, Clone, Deserialize)]
struct RelationshipData {
    data: Option<RelationshipId>,
}

#[derive(Debug, Clone, Deserialize)]
struct RelationshipId {
    id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OhlcvResponse {
    data: Option<OhlcvData>,
}

#[derive(Debug, Clone, Deserialize)]
struct OhlcvData {
    attributes: Option<OhlcvAttributes>,
}

#[derive(Debug, Clone, Deserialize)]
struct OhlcvAttributes {
    /// Rows of [timestamp, open, high, low, close, volume]
    ohlcv_list: Option<Vec<Vec<f64>>>,
}

pub struct GeckoProvider {
    http: reqwest::Client,
    access: Arc<DataAccess>,
    config: GeckoConfig,
}

impl GeckoProvider {
    pub fn new(config: GeckoConfig, access: Arc<DataAccess>) -> Self {
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
        let key = format!("gecko:{}", path_and_query);

        self.access
            .request("gecko", &key, self.policy(), move || {
                let http = http.clone();
                let url = url.clone();
                async move {
                    let resp = http
                        .get(&url)
                        .header("accept", "application/json")
                        .send()
                        .await?;
                    super::read_json(resp).await
                }
            })
            .await
    }

    /// The pool with the deepest reserve for a token, if any
    async fn top_pool(&self, address: &str) -> Result<Option<PoolAttributes>> {
        let value = self
            .get(&format!(
                "/networks/{}/tokens/{}/pools?page=1",
                NETWORK, address
            ))
            .await?;
        let parsed: PoolListResponse = serde_json::from_value(value)?;
        Ok(parsed
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.attributes)
            .next())
    }

    async fn pool_ohlcv(&self, pool_address: &str) -> Result<Vec<Candle>> {
        let value = self
            .get(&format!(
                "/networks/{}/pools/{}/ohlcv/minute?aggregate={}&limit={}",
                NETWORK, pool_address, OHLCV_AGGREGATE, OHLCV_LIMIT
            ))
            .await?;
        let parsed: OhlcvResponse = serde_json::from_value(value)?;

        let mut candles: Vec<Candle> = parsed
            .data
            .and_then(|d| d.attributes)
            .and_then(|a| a.ohlcv_list)
            .unwrap_or_default()
            .into_iter()
            .filter_map(row_to_candle)
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

fn row_to_candle(row: Vec<f64>) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }
    Some(Candle {
        timestamp: row[0] as i64,
        open: row[1],
        high: row[2],
        low: row[3],
        close: row[4],
        volume: row[5],
    })
}

/// Relationship ids look like "solana_<mint>"
fn mint_from_relationship(id: &str) -> Option<String> {
    id.strip_prefix("solana_").map(|mint| mint.to_string())
}

fn parse_usd(field: &Option<String>) -> Option<f64> {
    field.as_ref().and_then(|s| s.parse::<f64>().ok())
}

/// Pool names look like "TOKEN / SOL"
fn token_name_from_pool(name: &str) -> String {
    name.split('/')
        .next()
        .map(|part| part.trim().to_string())
        .unwrap_or_else(|| name.to_string())
}

#[async_trait]
impl MarketDataProvider for GeckoProvider {
    fn name(&self) -> &'static str {
        "gecko"
    }

    async fn discover(&self, limit: usize) -> Result<Vec<SeedToken>> {
        let value = self
            .get(&format!("/networks/{}/trending_pools?page=1", NETWORK))
            .await?;
        let parsed: PoolListResponse = serde_json::from_value(value)?;

        let mut seeds = Vec::new();
        for pool in parsed.data.unwrap_or_default() {
            if seeds.len() >= limit {
                break;
            }
            let Some(mint) = pool
                .relationships
                .as_ref()
                .and_then(|r| r.base_token.as_ref())
                .and_then(|b| b.data.as_ref())
                .and_then(|d| d.id.as_deref())
                .and_then(mint_from_relationship)
            else {
                continue;
            };
            let name = pool
                .attributes
                .as_ref()
                .and_then(|a| a.name.as_deref())
                .map(token_name_from_pool)
                .unwrap_or_else(|| "Unknown".to_string());
            seeds.push(SeedToken {
                address: mint,
                symbol: name.clone(),
                name,
                decimals: None,
            });
        }
        Ok(seeds)
    }

    async fn fetch_metrics(&self, address: &str) -> Result<TokenMetrics> {
        let mut metrics = TokenMetrics::new();
        // No security or holder endpoints on this API.
        metrics.holders_supported = false;

        let pool = match self.top_pool(address).await {
            Ok(Some(pool)) => pool,
            Ok(None) => return Err(Error::UnknownMint(address.to_string())),
            Err(e) if e.is_quota_exhausted() => return Err(e),
            Err(e) => {
                warn!(address, error = %e, "pool lookup failed");
                return Ok(metrics);
            }
        };

        metrics.liquidity_usd = parse_usd(&pool.reserve_in_usd);
        metrics.vol24h_usd = pool.volume_usd.as_ref().and_then(|v| parse_usd(&v.h24));

        if let Some(pool_address) = pool.address.as_deref() {
            match self.pool_ohlcv(pool_address).await {
                Ok(candles) => {
                    metrics.vol15m_usd = candles.last().map(|c| c.volume);
                    metrics.candles = candles;
                }
                Err(e) if e.is_quota_exhausted() => return Err(e),
                Err(e) => warn!(address, error = %e, "ohlcv fetch failed"),
            }
        } else {
            debug!(address, "pool has no address, skipping ohlcv");
        }

        Ok(metrics)
    }

    async fn recent_candles(&self, address: &str, bars: usize) -> Result<Vec<Candle>> {
        let pool = self
            .top_pool(address)
            .await?
            .ok_or_else(|| Error::UnknownMint(address.to_string()))?;
        let pool_address = pool
            .address
            .ok_or_else(|| Error::Provider("pool has no address".to_string()))?;
        let mut candles = self.pool_ohlcv(&pool_address).await?;
        if candles.len() > bars {
            candles.drain(..candles.len() - bars);
        }
        Ok(candles)
    }
}
