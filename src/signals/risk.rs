//! Rug-risk scoring
//!
//! Converts security, holder and liquidity metadata into a weighted score
//! with named flags. Unknown booleans contribute nothing; only an explicit
//! positive signal adds weight. The score is unbounded; callers apply their
//! own acceptance ceiling.

use serde::Serialize;

use crate::providers::types::TokenMetrics;

// Fixed weights per risk condition.
const W_SCAM: f64 = 5.0;
const W_HONEYPOT: f64 = 5.0;
const W_MINTABLE: f64 = 2.0;
const W_FREEZEABLE: f64 = 2.0;
const W_OWNER_CAN_CHANGE: f64 = 1.5;
const W_HIGH_TAX: f64 = 1.5;
const W_LP_UNLOCKED: f64 = 2.0;
const W_MINT_AUTHORITY: f64 = 2.0;
const W_FREEZE_AUTHORITY: f64 = 2.0;
const W_HOLDER_CONCENTRATION: f64 = 2.0;
const W_THIN_LIQUIDITY: f64 = 1.0;
const W_THIN_VOLUME: f64 = 1.0;

/// Liquidity/volume below this multiple of the configured minimum is thin
const THIN_MULTIPLE: f64 = 2.0;

/// Risk verdict for one candidate, computed once per scan
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub flags: Vec<&'static str>,
    pub holders_pct: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub vol24h_usd: Option<f64>,
}

impl RiskAssessment {
    pub fn is_flagged(&self, flag: &str) -> bool {
        self.flags.contains(&flag)
    }
}

/// Scorer carrying the numeric thresholds from configuration
pub struct RiskScorer {
    max_holder_pct: f64,
    min_liquidity_usd: f64,
    min_vol24h_usd: f64,
}

impl RiskScorer {
    pub fn new(max_holder_pct: f64, min_liquidity_usd: f64, min_vol24h_usd: f64) -> Self {
        Self {
            max_holder_pct,
            min_liquidity_usd,
            min_vol24h_usd,
        }
    }

    pub fn assess(&self, metrics: &TokenMetrics) -> RiskAssessment {
        let security = &metrics.security;

        let boolean_checks: [(Option<bool>, f64, &'static str); 9] = [
            (security.is_scam, W_SCAM, "scam"),
            (security.is_honeypot, W_HONEYPOT, "honeypot"),
            (security.is_mintable, W_MINTABLE, "mintable"),
            (security.is_freezeable, W_FREEZEABLE, "freezeable"),
            (security.owner_can_change, W_OWNER_CAN_CHANGE, "owner_can_change"),
            (security.high_tax, W_HIGH_TAX, "high_tax"),
            (security.lp_unlocked, W_LP_UNLOCKED, "lp_unlocked"),
            (security.has_mint_authority, W_MINT_AUTHORITY, "mint_authority"),
            (
                security.has_freeze_authority,
                W_FREEZE_AUTHORITY,
                "freeze_authority",
            ),
        ];

        let numeric_checks: [(bool, f64, &'static str); 3] = [
            (
                metrics
                    .holders_pct
                    .map(|pct| pct > self.max_holder_pct)
                    .unwrap_or(false),
                W_HOLDER_CONCENTRATION,
                "holder_concentration",
            ),
            (
                metrics
                    .liquidity_usd
                    .map(|liq| liq < self.min_liquidity_usd * THIN_MULTIPLE)
                    .unwrap_or(false),
                W_THIN_LIQUIDITY,
                "thin_liquidity",
            ),
            (
                metrics
                    .vol24h_usd
                    .map(|vol| vol < self.min_vol24h_usd * THIN_MULTIPLE)
                    .unwrap_or(false),
                W_THIN_VOLUME,
                "thin_volume",
            ),
        ];

        let mut score = 0.0;
        let mut flags = Vec::new();
        for (value, weight, flag) in boolean_checks {
            if value == Some(true) {
                score += weight;
                flags.push(flag);
            }
        }
        for (triggered, weight, flag) in numeric_checks {
            if triggered {
                score += weight;
                flags.push(flag);
            }
        }

        RiskAssessment {
            score,
            flags,
            holders_pct: metrics.holders_pct,
            liquidity_usd: metrics.liquidity_usd,
            vol24h_usd: metrics.vol24h_usd,
        }
    }
}
