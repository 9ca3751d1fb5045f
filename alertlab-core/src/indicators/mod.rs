//! Close-price indicators used by signal-based entries.
//!
//! Indicators are pure functions of a close series: values in, one output
//! per input out. They are computed once per run over the usable candles,
//! before the entry scan starts. Warmup positions are `f64::NAN`.
//!
//! No value at position t may depend on closes after t. The
//! truncated-vs-full test in each module checks this.

pub mod ema;
pub mod rsi;
pub mod signal;
pub mod sma;

pub use ema::Ema;
pub use rsi::Rsi;
pub use signal::signal_series;
pub use sma::Sma;

/// A single-series indicator over closes.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading outputs that are warmup (`NaN`).
    fn lookback(&self) -> usize;

    /// Output has the same length as `closes`.
    fn compute(&self, closes: &[f64]) -> Vec<f64>;
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Computing on a prefix must reproduce the prefix of the full computation.
#[cfg(test)]
pub fn assert_no_lookahead(indicator: &dyn Indicator, closes: &[f64]) {
    let full = indicator.compute(closes);
    for cut in 1..closes.len() {
        let partial = indicator.compute(&closes[..cut]);
        for (i, (&p, &f)) in partial.iter().zip(full.iter()).enumerate() {
            if f.is_nan() {
                assert!(p.is_nan(), "{} look-ahead at {i} (cut {cut})", indicator.name());
            } else {
                assert_approx(p, f, DEFAULT_EPSILON);
            }
        }
    }
}
