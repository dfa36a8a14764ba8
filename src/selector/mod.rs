//! Candidate selection
//!
//! Orchestrates one provider's discovery for a scan: filter gates, signal
//! and risk computation, composite scoring, and a three-tier fallback
//! (strict, relaxed momentum, volatility-only). Every rejection is counted
//! per gate so an empty scan is diagnosable.

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{FilterConfig, SignalConfig, SignalMode, TradingConfig};
use crate::error::{Error, Result};
use crate::execution::{sol_to_lamports, SwapExecutor, SOL_MINT};
use crate::model::ScoringModel;
use crate::providers::types::SeedToken;
use crate::providers::MarketDataProvider;
use crate::signals::{
    IndicatorSnapshot, MomentumSnapshot, RiskAssessment, RiskScorer, VolatilitySnapshot,
};

/// Floor for the relaxed-momentum fallback tier: both windows must merely
/// be non-negative rather than clear the configured minimums.
// TODO: re-derive this floor from fill outcomes; zero is inherited behavior,
// not a tuned value.
pub const RELAXED_MOMENTUM_FLOOR_PCT: f64 = 0.0;

/// How a candidate qualified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionTier {
    Strict,
    RelaxedMomentum,
    VolatilityOnly,
}

impl SelectionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionTier::Strict => "strict",
            SelectionTier::RelaxedMomentum => "relaxed_momentum",
            SelectionTier::VolatilityOnly => "volatility_only",
        }
    }
}

/// Per-gate rejection tally for one scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct RejectionCounts {
    pub name_blocked: u32,
    pub unknown_mint: u32,
    pub metrics_failed: u32,
    pub liquidity: u32,
    pub volume_24h: u32,
    pub security: u32,
    pub authority: u32,
    pub holders: u32,
    pub history: u32,
    pub volume_15m: u32,
    pub volatility: u32,
    pub price_impact: u32,
    pub rug_risk: u32,
    pub model_veto: u32,
}

/// Outcome summary of one scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub scanned: usize,
    pub strict: usize,
    pub relaxed: usize,
    pub volatility_only: usize,
    pub rejections: RejectionCounts,
}

/// A token that survived every gate in one scan; transient
#[derive(Debug, Clone)]
pub struct Candidate {
    pub address: String,
    pub name: String,
    pub decimals: Option<u8>,
    pub score: f64,
    pub tier: SelectionTier,
    pub signal: Option<IndicatorSnapshot>,
    pub momentum: Option<MomentumSnapshot>,
    pub volatility: VolatilitySnapshot,
    pub price_impact_pct: Option<f64>,
    pub risk: RiskAssessment,
}

pub struct CandidateSelector {
    filters: FilterConfig,
    signals: SignalConfig,
    trading: TradingConfig,
    scan_limit: usize,
    blocked: Vec<Regex>,
    risk_scorer: RiskScorer,
    model: Option<ScoringModel>,
    /// Set once when the active provider cannot serve holder data at all
    holder_check_disabled: bool,
}

impl CandidateSelector {
    pub fn new(
        filters: FilterConfig,
        signals: SignalConfig,
        trading: TradingConfig,
        scan_limit: usize,
        model: Option<ScoringModel>,
    ) -> Result<Self> {
        let blocked = filters
            .blocked_name_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| Error::Config(format!("bad name pattern {:?}: {}", pattern, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let risk_scorer = RiskScorer::new(
            filters.max_holder_pct,
            filters.min_liquidity_usd,
            filters.min_vol24h_usd,
        );

        Ok(Self {
            filters,
            signals,
            trading,
            scan_limit,
            blocked,
            risk_scorer,
            model,
            holder_check_disabled: false,
        })
    }

    /// Run one scan against the active provider and return the best
    /// candidate under the tier fallback, plus the scan report.
    pub async fn select(
        &mut self,
        provider: &dyn MarketDataProvider,
        executor: &dyn SwapExecutor,
    ) -> Result<(Option<Candidate>, ScanReport)> {
        let seeds = provider.discover(self.scan_limit).await?;

        let mut report = ScanReport {
            scanned: seeds.len(),
            ..ScanReport::default()
        };

        // Discovery order is preserved within each bucket so equal scores
        // resolve to the first-seen candidate.
        let mut strict: Vec<Candidate> = Vec::new();
        let mut relaxed: Vec<Candidate> = Vec::new();
        let mut volatility_only: Vec<Candidate> = Vec::new();

        for seed in seeds {
            match self
                .evaluate_seed(provider, executor, &seed, &mut report.rejections)
                .await
            {
                Ok(Some(candidate)) => match candidate.tier {
                    SelectionTier::Strict => strict.push(candidate),
                    SelectionTier::RelaxedMomentum => relaxed.push(candidate),
                    SelectionTier::VolatilityOnly => volatility_only.push(candidate),
                },
                Ok(None) => {}
                Err(e) if e.is_quota_exhausted() => return Err(e),
                Err(e) => {
                    report.rejections.metrics_failed += 1;
                    debug!(address = %seed.address, error = %e, "seed evaluation failed");
                }
            }
        }

        report.strict = strict.len();
        report.relaxed = relaxed.len();
        report.volatility_only = volatility_only.len();

        let pick = if let Some(best) = best_of(strict) {
            Some(best)
        } else if let Some(best) = best_of(relaxed) {
            warn!(
                address = %best.address,
                score = best.score,
                "no strict candidate, falling back to relaxed momentum"
            );
            Some(best)
        } else if let Some(best) = best_of(volatility_only) {
            warn!(
                address = %best.address,
                score = best.score,
                "no signal candidate, falling back to volatility only"
            );
            Some(best)
        } else {
            info!(rejections = ?report.rejections, scanned = report.scanned, "scan produced no candidate");
            None
        };

        Ok((pick, report))
    }

    async fn evaluate_seed(
        &mut self,
        provider: &dyn MarketDataProvider,
        executor: &dyn SwapExecutor,
        seed: &SeedToken,
        rejections: &mut RejectionCounts,
    ) -> Result<Option<Candidate>> {
        if self
            .blocked
            .iter()
            .any(|re| re.is_match(&seed.name) || re.is_match(&seed.symbol))
        {
            rejections.name_blocked += 1;
            return Ok(None);
        }

        let metrics = match provider.fetch_metrics(&seed.address).await {
            Ok(metrics) => metrics,
            Err(Error::UnknownMint(_)) => {
                // Expected noise in discovery feeds.
                rejections.unknown_mint += 1;
                debug!(address = %seed.address, "unrecognized mint, skipping");
                return Ok(None);
            }
            Err(e) if e.is_quota_exhausted() => return Err(e),
            Err(e) => {
                rejections.metrics_failed += 1;
                warn!(address = %seed.address, error = %e, "metrics fetch failed");
                return Ok(None);
            }
        };

        // Gates fail open on unknown values and closed on explicit signals.
        if let Some(liquidity) = metrics.liquidity_usd {
            if liquidity < self.filters.min_liquidity_usd {
                rejections.liquidity += 1;
                return Ok(None);
            }
        }
        if let Some(vol24h) = metrics.vol24h_usd {
            if vol24h < self.filters.min_vol24h_usd {
                rejections.volume_24h += 1;
                return Ok(None);
            }
        }
        if metrics.security.has_hard_stop() {
            rejections.security += 1;
            return Ok(None);
        }
        if metrics.security.has_authority() {
            rejections.authority += 1;
            return Ok(None);
        }

        if !metrics.holders_supported && !self.holder_check_disabled {
            self.holder_check_disabled = true;
            warn!("provider cannot serve holder data; disabling holder concentration gate");
        }
        if !self.holder_check_disabled {
            if let Some(holders_pct) = metrics.holders_pct {
                if holders_pct > self.filters.max_holder_pct {
                    rejections.holders += 1;
                    return Ok(None);
                }
            }
        }

        if metrics.candles.len() < self.filters.min_candles {
            rejections.history += 1;
            return Ok(None);
        }
        if let Some(vol15m) = metrics.vol15m_usd {
            if vol15m < self.filters.min_vol15m_usd {
                rejections.volume_15m += 1;
                return Ok(None);
            }
        }

        let volatility = VolatilitySnapshot::compute(&metrics.candles, self.signals.volatility_bars);
        if !volatility.ok || volatility.range_pct < self.signals.min_range_pct {
            rejections.volatility += 1;
            return Ok(None);
        }

        let (signal, momentum, base_score, signal_ok, relaxed_ok) = match self.signals.mode {
            SignalMode::Indicator => {
                match IndicatorSnapshot::compute(&metrics.candles, &self.signals) {
                    Some(snapshot) => {
                        let (score, ok) = (snapshot.score, snapshot.ok);
                        (Some(snapshot), None, score, ok, false)
                    }
                    None => {
                        rejections.history += 1;
                        return Ok(None);
                    }
                }
            }
            SignalMode::Momentum => {
                match MomentumSnapshot::compute(&metrics.candles, &self.signals) {
                    Some(snapshot) => {
                        let relaxed_ok = snapshot.pct_short >= RELAXED_MOMENTUM_FLOOR_PCT
                            && snapshot.pct_long >= RELAXED_MOMENTUM_FLOOR_PCT;
                        (None, Some(snapshot), snapshot.score, snapshot.ok, relaxed_ok)
                    }
                    None => {
                        rejections.history += 1;
                        return Ok(None);
                    }
                }
            }
        };

        // Quote the configured trade size to learn the price impact; a
        // failed quote leaves the impact unknown rather than rejecting.
        let lamports = sol_to_lamports(self.trading.buy_amount_sol);
        let price_impact_pct = match executor
            .quote(
                SOL_MINT,
                &seed.address,
                lamports,
                self.trading.max_slippage_pct,
            )
            .await
        {
            Ok(quote) => quote.price_impact_pct,
            Err(e) => {
                debug!(address = %seed.address, error = %e, "quote failed, impact unknown");
                None
            }
        };
        if let Some(impact) = price_impact_pct {
            if impact > self.trading.max_price_impact_pct {
                rejections.price_impact += 1;
                return Ok(None);
            }
        }

        let risk = self.risk_scorer.assess(&metrics);
        if self.filters.max_rug_score >= 0.0 && risk.score > self.filters.max_rug_score {
            rejections.rug_risk += 1;
            return Ok(None);
        }

        let impact_bonus = price_impact_pct
            .map(|impact| (self.trading.max_price_impact_pct - impact) / 2.0)
            .unwrap_or(0.0);
        let score = base_score
            + self.signals.volatility_weight * volatility.range_pct
            + volatility.chop_pct
            + impact_bonus
            - self.signals.risk_weight * risk.score;

        if let Some(model) = &self.model {
            let features = build_features(
                score,
                &risk,
                price_impact_pct,
                &volatility,
                signal.as_ref(),
                momentum.as_ref(),
            );
            let verdict = model.score(&features);
            if verdict.is_veto() {
                rejections.model_veto += 1;
                debug!(
                    address = %seed.address,
                    probability = verdict.probability,
                    threshold = verdict.threshold,
                    "model vetoed candidate"
                );
                return Ok(None);
            }
        }

        let tier = if signal_ok {
            SelectionTier::Strict
        } else if relaxed_ok {
            SelectionTier::RelaxedMomentum
        } else {
            SelectionTier::VolatilityOnly
        };

        Ok(Some(Candidate {
            address: seed.address.clone(),
            name: seed.name.clone(),
            decimals: seed.decimals.or(metrics.decimals),
            score,
            tier,
            signal,
            momentum,
            volatility,
            price_impact_pct,
            risk,
        }))
    }
}

/// Highest score wins; the sort is stable and no secondary key is applied,
/// so equal scores resolve to discovery order.
fn best_of(mut candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.into_iter().next()
}

fn build_features(
    score: f64,
    risk: &RiskAssessment,
    price_impact_pct: Option<f64>,
    volatility: &VolatilitySnapshot,
    signal: Option<&IndicatorSnapshot>,
    momentum: Option<&MomentumSnapshot>,
) -> HashMap<String, f64> {
    let mut features = HashMap::new();
    features.insert("score".to_string(), score);
    features.insert("rug_risk_score".to_string(), risk.score);
    features.insert(
        "rug_holders_pct".to_string(),
        risk.holders_pct.unwrap_or(0.0),
    );
    features.insert(
        "rug_liquidity_usd".to_string(),
        risk.liquidity_usd.unwrap_or(0.0),
    );
    features.insert(
        "rug_vol24h_usd".to_string(),
        risk.vol24h_usd.unwrap_or(0.0),
    );
    features.insert(
        "price_impact_pct".to_string(),
        price_impact_pct.unwrap_or(0.0),
    );
    features.insert("volatility_range_pct".to_string(), volatility.range_pct);
    features.insert("volatility_chop_pct".to_string(), volatility.chop_pct);
    features.insert(
        "signal_score".to_string(),
        signal.map(|s| s.score).unwrap_or(0.0),
    );
    features.insert(
        "momentum_score".to_string(),
        momentum.map(|m| m.score).unwrap_or(0.0),
    );
    features.insert(
        "momentum_pct_short".to_string(),
        momentum.map(|m| m.pct_short).unwrap_or(0.0),
    );
    features.insert(
        "momentum_pct_long".to_string(),
        momentum.map(|m| m.pct_long).unwrap_or(0.0),
    );
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Quote, TxHandle};
    use crate::providers::types::{Candle, TokenMetrics, TokenSecurity};
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;

    struct StubProvider {
        seeds: Vec<SeedToken>,
        metrics: StdHashMap<String, TokenMetrics>,
        quota_exhausted: bool,
    }

    #[async_trait]
    impl MarketDataProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn discover(&self, limit: usize) -> Result<Vec<SeedToken>> {
            if self.quota_exhausted {
                return Err(Error::QuotaExhausted("CU limit".to_string()));
            }
            Ok(self.seeds.iter().take(limit).cloned().collect())
        }

        async fn fetch_metrics(&self, address: &str) -> Result<TokenMetrics> {
            self.metrics
                .get(address)
                .cloned()
                .ok_or_else(|| Error::UnknownMint(address.to_string()))
        }

        async fn recent_candles(&self, _address: &str, _bars: usize) -> Result<Vec<Candle>> {
            Ok(vec![])
        }
    }

    struct StubExecutor {
        impact: Option<f64>,
    }

    #[async_trait]
    impl SwapExecutor for StubExecutor {
        async fn quote(
            &self,
            input_mint: &str,
            output_mint: &str,
            amount: u64,
            max_slippage_pct: f64,
        ) -> Result<Quote> {
            Ok(Quote {
                input_mint: input_mint.to_string(),
                output_mint: output_mint.to_string(),
                in_amount: amount,
                out_amount: amount,
                price_impact_pct: self.impact,
                max_slippage_pct,
            })
        }

        async fn swap(&self, _quote: &Quote) -> Result<TxHandle> {
            Ok(TxHandle {
                signature: "stub".to_string(),
            })
        }

        async fn confirm(&self, _tx: &TxHandle) -> Result<bool> {
            Ok(true)
        }

        async fn wallet_balance_sol(&self) -> Result<f64> {
            Ok(1.0)
        }
    }

    fn seed(address: &str) -> SeedToken {
        SeedToken {
            address: address.to_string(),
            name: format!("{} token", address),
            symbol: address.to_string(),
            decimals: Some(6),
        }
    }

    /// 40 bars trending up ~10% with healthy volume
    fn rising_candles() -> Vec<Candle> {
        (0..40)
            .map(|i| {
                let close = 100.0 + i as f64 * 0.25;
                Candle {
                    timestamp: i * 900,
                    open: close,
                    high: close + 0.1,
                    low: close - 0.1,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    /// 40 bars trending down
    fn falling_candles() -> Vec<Candle> {
        (0..40)
            .map(|i| {
                let close = 110.0 - i as f64 * 0.25;
                Candle {
                    timestamp: i * 900,
                    open: close,
                    high: close + 0.1,
                    low: close - 0.1,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    fn healthy_metrics(candles: Vec<Candle>) -> TokenMetrics {
        TokenMetrics {
            liquidity_usd: Some(100_000.0),
            vol24h_usd: Some(500_000.0),
            vol15m_usd: Some(1_000.0),
            holders_pct: Some(10.0),
            security: TokenSecurity::default(),
            candles,
            ..TokenMetrics::new()
        }
    }

    /// Momentum mode with unconstrained minimums, so healthy tokens land
    /// in the strict tier.
    fn momentum_signals() -> SignalConfig {
        let mut signals = SignalConfig::default();
        signals.mode = SignalMode::Momentum;
        signals.momentum_min_short_pct = 0.0;
        signals.momentum_min_long_pct = 0.0;
        signals
    }

    fn selector(signals: SignalConfig) -> CandidateSelector {
        CandidateSelector::new(
            FilterConfig::default(),
            signals,
            TradingConfig::default(),
            12,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_equal_scores_resolve_to_first_seen() {
        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), healthy_metrics(rising_candles()));
        metrics.insert("BBB".to_string(), healthy_metrics(rising_candles()));

        let provider = StubProvider {
            seeds: vec![seed("AAA"), seed("BBB")],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: Some(1.0) };

        let mut selector = selector(momentum_signals());
        let (pick, report) = selector.select(&provider, &executor).await.unwrap();

        let pick = pick.unwrap();
        assert_eq!(report.strict, 2);
        assert_eq!(pick.tier, SelectionTier::Strict);
        // Identical data means identical scores; discovery order breaks the tie.
        assert_eq!(pick.address, "AAA");
    }

    #[tokio::test]
    async fn test_fallback_to_relaxed_momentum() {
        let mut signals = momentum_signals();
        // Require more short-window momentum than the data has.
        signals.momentum_min_short_pct = 50.0;

        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), healthy_metrics(rising_candles()));

        let provider = StubProvider {
            seeds: vec![seed("AAA")],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: Some(1.0) };

        let mut selector = selector(signals);
        let (pick, report) = selector.select(&provider, &executor).await.unwrap();

        let pick = pick.unwrap();
        assert_eq!(report.strict, 0);
        assert_eq!(report.relaxed, 1);
        assert_eq!(pick.tier, SelectionTier::RelaxedMomentum);
    }

    #[tokio::test]
    async fn test_fallback_to_volatility_only() {
        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), healthy_metrics(falling_candles()));

        let provider = StubProvider {
            seeds: vec![seed("AAA")],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: Some(1.0) };

        // Negative momentum fails both the strict and relaxed tiers.
        let mut selector = selector(momentum_signals());
        let (pick, report) = selector.select(&provider, &executor).await.unwrap();

        let pick = pick.unwrap();
        assert_eq!(report.volatility_only, 1);
        assert_eq!(pick.tier, SelectionTier::VolatilityOnly);
    }

    #[tokio::test]
    async fn test_rejections_are_counted_per_gate() {
        let mut thin = healthy_metrics(rising_candles());
        thin.liquidity_usd = Some(5_000.0);

        let mut scammy = healthy_metrics(rising_candles());
        scammy.security.is_scam = Some(true);

        let mut short_history = healthy_metrics(rising_candles());
        short_history.candles.truncate(5);

        let mut metrics = StdHashMap::new();
        metrics.insert("THIN".to_string(), thin);
        metrics.insert("SCAM".to_string(), scammy);
        metrics.insert("SHORT".to_string(), short_history);

        let provider = StubProvider {
            seeds: vec![seed("THIN"), seed("SCAM"), seed("SHORT"), seed("GHOST")],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: Some(1.0) };

        let mut selector = selector(momentum_signals());
        let (pick, report) = selector.select(&provider, &executor).await.unwrap();

        assert!(pick.is_none());
        assert_eq!(report.rejections.liquidity, 1);
        assert_eq!(report.rejections.security, 1);
        assert_eq!(report.rejections.history, 1);
        assert_eq!(report.rejections.unknown_mint, 1);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_propagates() {
        let provider = StubProvider {
            seeds: vec![],
            metrics: StdHashMap::new(),
            quota_exhausted: true,
        };
        let executor = StubExecutor { impact: None };

        let mut selector = selector(momentum_signals());
        let err = selector.select(&provider, &executor).await.unwrap_err();
        assert!(err.is_quota_exhausted());
    }

    #[tokio::test]
    async fn test_price_impact_gate() {
        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), healthy_metrics(rising_candles()));

        let provider = StubProvider {
            seeds: vec![seed("AAA")],
            metrics,
            quota_exhausted: false,
        };
        // Impact above the configured maximum of 8%.
        let executor = StubExecutor { impact: Some(12.0) };

        let mut selector = selector(momentum_signals());
        let (pick, report) = selector.select(&provider, &executor).await.unwrap();

        assert!(pick.is_none());
        assert_eq!(report.rejections.price_impact, 1);
    }

    #[tokio::test]
    async fn test_unknown_impact_fails_open() {
        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), healthy_metrics(rising_candles()));

        let provider = StubProvider {
            seeds: vec![seed("AAA")],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: None };

        let mut selector = selector(momentum_signals());
        let (pick, _) = selector.select(&provider, &executor).await.unwrap();

        let pick = pick.unwrap();
        assert_eq!(pick.price_impact_pct, None);
    }

    #[tokio::test]
    async fn test_unsupported_holder_data_disables_gate_once() {
        let mut concentrated = healthy_metrics(rising_candles());
        concentrated.holders_supported = false;
        // Way past the configured maximum, but the gate is disabled.
        concentrated.holders_pct = Some(95.0);

        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), concentrated);

        let provider = StubProvider {
            seeds: vec![seed("AAA")],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: Some(1.0) };

        let mut selector = selector(momentum_signals());
        let (pick, report) = selector.select(&provider, &executor).await.unwrap();

        assert!(pick.is_some());
        assert_eq!(report.rejections.holders, 0);
        assert!(selector.holder_check_disabled);
    }

    #[tokio::test]
    async fn test_holder_gate_rejects_when_supported() {
        let mut concentrated = healthy_metrics(rising_candles());
        concentrated.holders_pct = Some(95.0);

        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), concentrated);

        let provider = StubProvider {
            seeds: vec![seed("AAA")],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: Some(1.0) };

        let mut selector = selector(momentum_signals());
        let (pick, report) = selector.select(&provider, &executor).await.unwrap();

        assert!(pick.is_none());
        assert_eq!(report.rejections.holders, 1);
    }

    #[tokio::test]
    async fn test_rug_risk_ceiling_and_disable() {
        let mut risky = healthy_metrics(rising_candles());
        risky.security.has_mint_authority = None;
        risky.security.lp_unlocked = Some(true);
        risky.security.high_tax = Some(true);
        // lp_unlocked + high_tax = 3.5, above a ceiling of 3.0. Neither is a
        // hard-stop flag nor an authority, so only the risk gate fires.
        let mut filters = FilterConfig::default();
        filters.max_rug_score = 3.0;

        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), risky.clone());

        let provider = StubProvider {
            seeds: vec![seed("AAA")],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: Some(1.0) };

        let mut selector = CandidateSelector::new(
            filters.clone(),
            momentum_signals(),
            TradingConfig::default(),
            12,
            None,
        )
        .unwrap();
        let (pick, report) = selector.select(&provider, &executor).await.unwrap();
        assert!(pick.is_none());
        assert_eq!(report.rejections.rug_risk, 1);

        // A negative ceiling disables the gate entirely.
        filters.max_rug_score = -1.0;
        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), risky);
        let provider = StubProvider {
            seeds: vec![seed("AAA")],
            metrics,
            quota_exhausted: false,
        };
        let mut selector = CandidateSelector::new(
            filters,
            momentum_signals(),
            TradingConfig::default(),
            12,
            None,
        )
        .unwrap();
        let (pick, _) = selector.select(&provider, &executor).await.unwrap();
        assert!(pick.is_some());
    }

    #[tokio::test]
    async fn test_blocked_name_pattern() {
        let mut filters = FilterConfig::default();
        filters.blocked_name_patterns = vec!["(?i)elon".to_string()];

        let mut metrics = StdHashMap::new();
        metrics.insert("AAA".to_string(), healthy_metrics(rising_candles()));

        let provider = StubProvider {
            seeds: vec![SeedToken {
                address: "AAA".to_string(),
                name: "ELON MARS".to_string(),
                symbol: "ELON".to_string(),
                decimals: Some(6),
            }],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: Some(1.0) };

        let mut selector = CandidateSelector::new(
            filters,
            momentum_signals(),
            TradingConfig::default(),
            12,
            None,
        )
        .unwrap();
        let (pick, report) = selector.select(&provider, &executor).await.unwrap();

        assert!(pick.is_none());
        assert_eq!(report.rejections.name_blocked, 1);
    }

    #[tokio::test]
    async fn test_higher_score_wins_regardless_of_order() {
        let slow = healthy_metrics(rising_candles());
        // Steeper rise scores higher in momentum mode.
        let fast = healthy_metrics(
            (0..40)
                .map(|i| {
                    let close = 100.0 + i as f64 * 1.0;
                    Candle {
                        timestamp: i * 900,
                        open: close,
                        high: close + 0.1,
                        low: close - 0.1,
                        close,
                        volume: 1_000.0,
                    }
                })
                .collect(),
        );

        let mut metrics = StdHashMap::new();
        metrics.insert("SLOW".to_string(), slow);
        metrics.insert("FAST".to_string(), fast);

        let provider = StubProvider {
            seeds: vec![seed("SLOW"), seed("FAST")],
            metrics,
            quota_exhausted: false,
        };
        let executor = StubExecutor { impact: Some(1.0) };

        let mut selector = selector(momentum_signals());
        let (pick, _) = selector.select(&provider, &executor).await.unwrap();
        assert_eq!(pick.unwrap().address, "FAST");
    }
}
