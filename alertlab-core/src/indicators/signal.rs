//! Entry signal evaluation over a close series.
//!
//! Level signals (RSI thresholds) fire on every position where the condition
//! holds. Cross signals fire only on the position where the condition turns
//! true, so a series that starts above its SMA does not fire at position 0.
//! Warmup (`NaN`) positions never fire.

use super::{Ema, Indicator, Rsi, Sma};
use crate::config::EntrySignal;

/// One flag per close: did the signal fire at that position.
pub fn signal_series(signal: &EntrySignal, closes: &[f64]) -> Vec<bool> {
    match signal {
        EntrySignal::RsiBelow { period, threshold } => Rsi::new(*period)
            .compute(closes)
            .into_iter()
            .map(|v| v < *threshold)
            .collect(),
        EntrySignal::RsiAbove { period, threshold } => Rsi::new(*period)
            .compute(closes)
            .into_iter()
            .map(|v| v > *threshold)
            .collect(),
        EntrySignal::EmaCrossUp { fast, slow } => {
            let fast = Ema::new(*fast).compute(closes);
            let slow = Ema::new(*slow).compute(closes);
            cross_up(&fast, &slow)
        }
        EntrySignal::CloseAboveSma { period } => {
            let sma = Sma::new(*period).compute(closes);
            cross_up(closes, &sma)
        }
    }
}

/// `a` crosses above `b`: `a > b` now and `a <= b` on the previous position.
/// Comparisons against NaN are false, so warmup never fires.
fn cross_up(a: &[f64], b: &[f64]) -> Vec<bool> {
    let mut out = vec![false; a.len()];
    for i in 1..a.len() {
        out[i] = a[i] > b[i] && a[i - 1] <= b[i - 1];
    }
    out
}
