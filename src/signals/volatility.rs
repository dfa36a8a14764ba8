//! Range and chop volatility over a bounded recent window

use serde::Serialize;

use crate::providers::types::Candle;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct VolatilitySnapshot {
    /// (max high - min low) / min low over the window, percent
    pub range_pct: f64,
    /// Average absolute bar-to-bar close change, percent
    pub chop_pct: f64,
    pub ok: bool,
}

impl VolatilitySnapshot {
    /// Compute over the last `bars` candles. Fewer than two usable bars
    /// (finite, positive low/high) reports not-ok.
    pub fn compute(candles: &[Candle], bars: usize) -> Self {
        let start = candles.len().saturating_sub(bars);
        let usable: Vec<&Candle> = candles[start..]
            .iter()
            .filter(|c| is_usable(c))
            .collect();

        if usable.len() < 2 {
            return Self::default();
        }

        let max_high = usable.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let min_low = usable.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let range_pct = (max_high - min_low) / min_low * 100.0;

        let mut changes = Vec::with_capacity(usable.len() - 1);
        for pair in usable.windows(2) {
            let prev = pair[0].close;
            if prev > 0.0 {
                changes.push(((pair[1].close - prev) / prev).abs() * 100.0);
            }
        }
        let chop_pct = if changes.is_empty() {
            0.0
        } else {
            changes.iter().sum::<f64>() / changes.len() as f64
        };

        Self {
            range_pct,
            chop_pct,
            ok: true,
        }
    }
}

fn is_usable(candle: &Candle) -> bool {
    candle.low.is_finite() && candle.high.is_finite() && candle.low > 0.0 && candle.high >= candle.low
}
