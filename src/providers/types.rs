//! Normalized market-data types
//!
//! Provider payloads vary wildly in shape and field naming; adapters flatten
//! them into these fixed structs at the boundary. Absent metrics stay `None`
//! and are treated as "unknown" by downstream filter gates.

use serde::{Deserialize, Serialize};

/// One OHLCV bar, ascending by timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Unix timestamp, seconds
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A token surfaced by discovery, before metrics enrichment
#[derive(Debug, Clone)]
pub struct SeedToken {
    /// Mint address
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: Option<u8>,
}

/// Security flags reported by a provider; `None` means unknown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSecurity {
    pub is_scam: Option<bool>,
    pub is_honeypot: Option<bool>,
    pub is_mintable: Option<bool>,
    pub is_freezeable: Option<bool>,
    pub owner_can_change: Option<bool>,
    pub high_tax: Option<bool>,
    pub lp_unlocked: Option<bool>,
    pub has_mint_authority: Option<bool>,
    pub has_freeze_authority: Option<bool>,
}

impl TokenSecurity {
    /// True when a hard-stop flag is explicitly set. Only outright scam
    /// signals stop a candidate here; the softer flags feed the risk score
    /// and its acceptance ceiling instead.
    pub fn has_hard_stop(&self) -> bool {
        self.is_scam == Some(true) || self.is_honeypot == Some(true)
    }

    /// True when either authority is explicitly retained
    pub fn has_authority(&self) -> bool {
        self.has_mint_authority == Some(true) || self.has_freeze_authority == Some(true)
    }
}

/// Enriched metrics for a single candidate
#[derive(Debug, Clone, Default)]
pub struct TokenMetrics {
    pub liquidity_usd: Option<f64>,
    pub vol24h_usd: Option<f64>,
    /// Volume traded in the most recent 15-minute bar
    pub vol15m_usd: Option<f64>,
    /// Top-holder share of supply, percent
    pub holders_pct: Option<f64>,
    /// False when the provider cannot serve holder data at all
    pub holders_supported: bool,
    pub decimals: Option<u8>,
    pub security: TokenSecurity,
    pub candles: Vec<Candle>,
}

impl TokenMetrics {
    pub fn new() -> Self {
        Self {
            holders_supported: true,
            ..Default::default()
        }
    }

    /// Closing prices in candle order
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}
