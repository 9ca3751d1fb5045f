//! Simple Moving Average: rolling mean of the last `period` closes.
//! Lookback: period - 1.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let mut out = vec![f64::NAN; closes.len()];
        if closes.len() < self.period {
            return out;
        }
        // Windows are summed directly: periods are small and this keeps a
        // non-finite close from poisoning a running sum.
        for (i, window) in closes.windows(self.period).enumerate() {
            if window.iter().all(|v| v.is_finite()) {
                out[i + self.period - 1] = window.iter().sum::<f64>() / self.period as f64;
            }
        }
        out
    }
}
