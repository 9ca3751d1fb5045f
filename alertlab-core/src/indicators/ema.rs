//! Exponential Moving Average.
//!
//! EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1),
//! seeded with the SMA of the first `period` closes. Lookback: period - 1.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let period = self.period;
        let mut out = vec![f64::NAN; closes.len()];
        if closes.len() < period {
            return out;
        }

        let seed_window = &closes[..period];
        if seed_window.iter().any(|v| !v.is_finite()) {
            return out;
        }
        let mut prev = seed_window.iter().sum::<f64>() / period as f64;
        out[period - 1] = prev;

        let alpha = 2.0 / (period as f64 + 1.0);
        for (slot, &close) in out[period..].iter_mut().zip(&closes[period..]) {
            // A non-finite close taints everything after it.
            if !close.is_finite() {
                break;
            }
            prev = alpha * close + (1.0 - alpha) * prev;
            *slot = prev;
        }
        out
    }
}
