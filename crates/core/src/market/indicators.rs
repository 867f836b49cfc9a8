//! Indicator math over daily bars. Each indicator is left empty when the history is too short to
//! compute it rather than filled with a neutral guess.

use crate::domain::scoring::TechnicalIndicators;
use crate::market::PriceBar;

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
const VOLUME_LOOKBACK: usize = 20;

pub fn compute_indicators(bars: &[PriceBar]) -> TechnicalIndicators {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    TechnicalIndicators {
        rsi: rsi(&closes, RSI_PERIOD),
        macd: macd_line(&closes, MACD_FAST, MACD_SLOW),
        volume: volumes
            .last()
            .filter(|v| v.is_finite() && **v >= 0.0)
            .map(|v| v.round() as u64),
        volume_change: volume_change(&volumes, VOLUME_LOOKBACK),
        sma_20: sma(&closes, 20),
        sma_50: sma(&closes, 50),
    }
}

/// Wilder-smoothed RSI. Needs `period + 1` closes.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    if avg_loss == 0.0 {
        // Flat series reads as neutral; one-way gains as maximally overbought.
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// EMA seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    let seed = sma(&values[..values.len().min(period)], period)?;
    let k = 2.0 / (period as f64 + 1.0);
    Some(
        values[period..]
            .iter()
            .fold(seed, |acc, v| (v - acc) * k + acc),
    )
}

pub fn macd_line(closes: &[f64], fast: usize, slow: usize) -> Option<f64> {
    if fast >= slow || closes.len() < slow {
        return None;
    }
    Some(ema(closes, fast)? - ema(closes, slow)?)
}

/// Percent change of the latest volume against the mean of up to `lookback` preceding bars.
pub fn volume_change(volumes: &[f64], lookback: usize) -> Option<f64> {
    let (last, prior) = volumes.split_last()?;
    if prior.is_empty() || lookback == 0 {
        return None;
    }
    let window = &prior[prior.len().saturating_sub(lookback)..];
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    if mean <= 0.0 || !mean.is_finite() {
        return None;
    }
    Some((last - mean) / mean * 100.0)
}
