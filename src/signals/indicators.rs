//! Moving-average, RSI and Bollinger indicators plus signal composition
//!
//! Series functions return `None` for every bar before their lookback
//! window is filled; an indicator never fabricates a value from
//! insufficient history.

use serde::Serialize;

use crate::config::SignalConfig;
use crate::providers::types::Candle;

/// Bars averaged for the volume-spike baseline
const VOLUME_BASELINE_BARS: usize = 10;

// Weights for the rule-based score: one hit per boolean signal,
// plus a bonus when RSI sits in the bullish half.
const W_VALLEY: f64 = 1.0;
const W_TREND: f64 = 1.5;
const W_TRIGGER: f64 = 1.0;
const W_VOLUME_SPIKE: f64 = 0.5;
const RSI_STRENGTH_BONUS: f64 = 0.5;

/// Exponential moving average seeded with the simple average of the first
/// `period` values; entries before the seed are `None`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() < period {
        return vec![None; values.len()];
    }

    let mut results = vec![None; period - 1];
    let k = 2.0 / (period as f64 + 1.0);

    let seed: f64 = values.iter().take(period).sum::<f64>() / period as f64;
    let mut prev = seed;
    results.push(Some(seed));

    for value in values.iter().skip(period) {
        let ema = value * k + prev * (1.0 - k);
        results.push(Some(ema));
        prev = ema;
    }
    results
}

/// RSI with Wilder smoothing over `period` changes; needs `period + 1`
/// values. Zero average loss pins the value at 100.
pub fn rsi_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() <= period {
        return vec![None; values.len()];
    }

    let mut results = vec![None; period];

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;
    results.push(Some(rsi_value(avg_gain, avg_loss)));

    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        results.push(Some(rsi_value(avg_gain, avg_loss)));
    }
    results
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// Bollinger band around the mean of the last `period` values
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Bollinger {
    pub mid: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Population standard deviation over the last `period` values
pub fn bollinger(values: &[f64], period: usize, std_mult: f64) -> Option<Bollinger> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    let std = variance.sqrt();
    Some(Bollinger {
        mid: mean,
        upper: mean + std_mult * std,
        lower: mean - std_mult * std,
    })
}

/// True when the fast EMA sits above the slow and both rose over the last step
pub fn trend_ok(closes: &[f64], fast_period: usize, slow_period: usize) -> bool {
    let fast = ema_series(closes, fast_period);
    let slow = ema_series(closes, slow_period);
    let n = closes.len();
    if n < 2 {
        return false;
    }
    match (
        fast[n - 1],
        fast[n - 2],
        slow[n - 1],
        slow[n - 2],
    ) {
        (Some(f1), Some(f0), Some(s1), Some(s0)) => f1 > s1 && f1 > f0 && s1 > s0,
        _ => false,
    }
}

/// Point-in-time view of every indicator signal
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSnapshot {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub bollinger: Bollinger,
    pub volume_spike: bool,
    pub valley: bool,
    pub trend: bool,
    pub trigger: bool,
    pub ok: bool,
    pub score: f64,
}

impl IndicatorSnapshot {
    /// Compute the snapshot for the latest bar, or `None` when the series is
    /// shorter than any required lookback.
    pub fn compute(candles: &[Candle], config: &SignalConfig) -> Option<Self> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        let n = closes.len();
        if n < 2 {
            return None;
        }

        let fast_series = ema_series(&closes, config.ema_fast);
        let slow_series = ema_series(&closes, config.ema_slow);

        let ema_fast = fast_series[n - 1]?;
        let ema_slow = slow_series[n - 1]?;
        let ema_fast_prev = fast_series[n - 2]?;
        let ema_slow_prev = slow_series[n - 2]?;

        let rsi = *rsi_series(&closes, config.rsi_period).last()?.as_ref()?;
        let bands = bollinger(&closes, config.bollinger_period, config.bollinger_std_mult)?;

        let close = closes[n - 1];
        let volume = volumes[n - 1];

        let baseline_start = n.saturating_sub(VOLUME_BASELINE_BARS + 1);
        let baseline = &volumes[baseline_start..n - 1];
        let avg_volume = if baseline.is_empty() {
            0.0
        } else {
            baseline.iter().sum::<f64>() / baseline.len() as f64
        };
        let volume_spike = avg_volume > 0.0 && volume > avg_volume * config.volume_spike_mult;

        let valley = rsi < config.rsi_low || close < bands.lower;
        let trend = ema_fast > ema_slow && ema_fast > ema_fast_prev && ema_slow > ema_slow_prev;
        let trigger = close > ema_fast && volume_spike;
        let ok = (valley && trigger) || trend;

        let mut score = 0.0;
        if valley {
            score += W_VALLEY;
        }
        if trend {
            score += W_TREND;
        }
        if trigger {
            score += W_TRIGGER;
        }
        if volume_spike {
            score += W_VOLUME_SPIKE;
        }
        if rsi > 50.0 {
            score += RSI_STRENGTH_BONUS;
        }

        Some(Self {
            ema_fast,
            ema_slow,
            rsi,
            bollinger: bands,
            volume_spike,
            valley,
            trend,
            trigger,
            ok,
            score,
        })
    }
}
