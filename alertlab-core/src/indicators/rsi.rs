//! Relative Strength Index with Wilder smoothing.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss). Lookback: period.
//! No losses gives 100, no gains gives 0, no movement gives 50.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let period = self.period;
        let mut out = vec![f64::NAN; closes.len()];
        if closes.len() <= period {
            return out;
        }

        let change = |i: usize| closes[i] - closes[i - 1];

        let (mut avg_gain, mut avg_loss) = (0.0, 0.0);
        for i in 1..=period {
            let ch = change(i);
            if !ch.is_finite() {
                return out;
            }
            avg_gain += ch.max(0.0);
            avg_loss += (-ch).max(0.0);
        }
        avg_gain /= period as f64;
        avg_loss /= period as f64;
        out[period] = rsi_value(avg_gain, avg_loss);

        let smoothing = (period as f64 - 1.0) / period as f64;
        for i in (period + 1)..closes.len() {
            let ch = change(i);
            if !ch.is_finite() {
                break;
            }
            avg_gain = avg_gain * smoothing + ch.max(0.0) / period as f64;
            avg_loss = avg_loss * smoothing + (-ch).max(0.0) / period as f64;
            out[i] = rsi_value(avg_gain, avg_loss);
        }
        out
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    match (avg_gain > 0.0, avg_loss > 0.0) {
        (false, false) => 50.0,
        (true, false) => 100.0,
        (false, true) => 0.0,
        (true, true) => 100.0 - 100.0 / (1.0 + avg_gain / avg_loss),
    }
}
