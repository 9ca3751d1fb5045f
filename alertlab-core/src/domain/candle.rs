//! Candle: the fundamental market data unit.

use crate::config::FillModel;
use serde::{Deserialize, Serialize};

/// OHLCV candle for a single token over one fixed time bucket.
///
/// `timestamp` is an integer whose unit (seconds or milliseconds) is fixed by
/// the caller for the whole run; the engine only compares timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLCV field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// Whether this candle may drive entry/exit triggers.
    ///
    /// Rejects void candles, non-positive prices, zero volume, and candles whose
    /// open/close fall outside the high-low range.
    pub fn is_usable(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.open > 0.0
            && self.low > 0.0
            && self.close > 0.0
            && self.volume > 0.0
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// The price used for non-wick actions (immediate entries, time exits).
    pub fn decision_price(&self, fill_model: FillModel) -> f64 {
        match fill_model {
            FillModel::Open => self.open,
            FillModel::Close => self.close,
        }
    }

    /// OHLC path heuristic: true when the low was most likely printed before
    /// the high (path Open → Low → High → Close).
    ///
    /// Ties go to the high-first path, matching the worst case for a
    /// rebound buyer.
    pub fn low_first(&self) -> bool {
        (self.open - self.low).abs() < (self.open - self.high).abs()
    }
}
