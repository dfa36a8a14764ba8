//! Percent-change momentum over two lookback windows
//!
//! The alternative entry signal to the indicator stack: how far price moved
//! from N bars ago to now, over a short and a long window.

use serde::Serialize;

use crate::config::SignalConfig;
use crate::providers::types::Candle;

const SHORT_WEIGHT: f64 = 0.7;
const LONG_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MomentumSnapshot {
    /// Percent change over the short lookback
    pub pct_short: f64,
    /// Percent change over the long lookback
    pub pct_long: f64,
    pub ok: bool,
    pub score: f64,
}

impl MomentumSnapshot {
    /// Compute momentum for the latest bar; `None` when the series is too
    /// short for the long lookback.
    pub fn compute(candles: &[Candle], config: &SignalConfig) -> Option<Self> {
        let pct_short = percent_change(candles, config.momentum_short_bars)?;
        let pct_long = percent_change(candles, config.momentum_long_bars)?;

        let ok = clears(pct_short, config.momentum_min_short_pct)
            && clears(pct_long, config.momentum_min_long_pct);
        let score = SHORT_WEIGHT * pct_short + LONG_WEIGHT * pct_long;

        Some(Self {
            pct_short,
            pct_long,
            ok,
            score,
        })
    }
}

/// A zero minimum leaves the window unconstrained
fn clears(pct: f64, minimum: f64) -> bool {
    minimum == 0.0 || pct >= minimum
}

/// Percent change from the close `bars` bars ago to the latest close
fn percent_change(candles: &[Candle], bars: usize) -> Option<f64> {
    if bars == 0 || candles.len() <= bars {
        return None;
    }
    let latest = candles.last()?.close;
    let past = candles[candles.len() - 1 - bars].close;
    if past <= 0.0 {
        return None;
    }
    Some((latest - past) / past * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: i as i64 * 900,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    fn config(short: usize, long: usize, min_short: f64, min_long: f64) -> SignalConfig {
        let mut config = SignalConfig::default();
        config.momentum_short_bars = short;
        config.momentum_long_bars = long;
        config.momentum_min_short_pct = min_short;
        config.momentum_min_long_pct = min_long;
        config
    }

    #[test]
    fn test_percent_change() {
        let candles = candles_from_closes(&[100.0, 105.0, 110.0]);
        assert!((percent_change(&candles, 2).unwrap() - 10.0).abs() < 1e-9);
        assert!(percent_change(&candles, 3).is_none());
    }

    #[test]
    fn test_ok_requires_both_windows() {
        let candles = candles_from_closes(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        // +5% over five bars, +~0.96% over one bar.
        let snapshot = MomentumSnapshot::compute(&candles, &config(1, 5, 2.0, 1.0)).unwrap();
        assert!(!snapshot.ok);

        let snapshot = MomentumSnapshot::compute(&candles, &config(1, 5, 0.5, 1.0)).unwrap();
        assert!(snapshot.ok);
    }

    #[test]
    fn test_zero_minimum_is_unconstrained() {
        let candles = candles_from_closes(&[100.0, 99.0, 98.0, 97.0, 96.0, 95.0]);
        // Falling price, but zero minimums disable both constraints.
        let snapshot = MomentumSnapshot::compute(&candles, &config(1, 5, 0.0, 0.0)).unwrap();
        assert!(snapshot.ok);
        assert!(snapshot.pct_short < 0.0);
    }

    #[test]
    fn test_score_weighting() {
        let candles = candles_from_closes(&[100.0, 100.0, 100.0, 100.0, 100.0, 110.0]);
        let snapshot = MomentumSnapshot::compute(&candles, &config(1, 5, 0.0, 0.0)).unwrap();
        assert!((snapshot.pct_short - 10.0).abs() < 1e-9);
        assert!((snapshot.pct_long - 10.0).abs() < 1e-9);
        assert!((snapshot.score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_history() {
        let candles = candles_from_closes(&[100.0, 101.0]);
        assert!(MomentumSnapshot::compute(&candles, &config(1, 5, 0.0, 0.0)).is_none());
    }
}
