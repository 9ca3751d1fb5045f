//! Data-quality pre-pass over a candle window.
//!
//! Decides once, up front, which candles may drive triggers. A candle is
//! skipped when it is degenerate (`Candle::is_usable` fails) or when its
//! timestamp does not advance past the last usable candle. Skipped candles
//! keep their index, so holding-period ages still count them.

use crate::domain::Candle;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Counts of candles excluded from triggering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataQuality {
    pub skipped_degenerate: usize,
    pub skipped_out_of_order: usize,
}

impl DataQuality {
    pub fn total_skipped(&self) -> usize {
        self.skipped_degenerate + self.skipped_out_of_order
    }

    pub fn is_clean(&self) -> bool {
        self.total_skipped() == 0
    }
}

/// Usability mask aligned with the candle slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsableMask {
    usable: Vec<bool>,
    quality: DataQuality,
}

impl UsableMask {
    pub fn scan(candles: &[Candle]) -> Self {
        let mut usable = Vec::with_capacity(candles.len());
        let mut quality = DataQuality::default();
        let mut last_ts: Option<i64> = None;

        for candle in candles {
            if !candle.is_usable() {
                quality.skipped_degenerate += 1;
                usable.push(false);
                continue;
            }
            if last_ts.is_some_and(|ts| candle.timestamp <= ts) {
                quality.skipped_out_of_order += 1;
                usable.push(false);
                continue;
            }
            last_ts = Some(candle.timestamp);
            usable.push(true);
        }

        if !quality.is_clean() {
            warn!(
                degenerate = quality.skipped_degenerate,
                out_of_order = quality.skipped_out_of_order,
                total = candles.len(),
                "skipping unusable candles"
            );
        }

        Self { usable, quality }
    }

    pub fn is_usable(&self, index: usize) -> bool {
        self.usable.get(index).copied().unwrap_or(false)
    }

    pub fn quality(&self) -> DataQuality {
        self.quality
    }

    pub fn len(&self) -> usize {
        self.usable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usable.is_empty()
    }

    /// First usable index at or after `from`.
    pub fn next_usable(&self, from: usize) -> Option<usize> {
        (from..self.usable.len()).find(|&i| self.usable[i])
    }

    /// Last usable index, if any.
    pub fn last_usable(&self) -> Option<usize> {
        self.usable.iter().rposition(|&u| u)
    }

    /// Usable indices within `range`, ascending.
    pub fn usable_in(
        &self,
        range: std::ops::Range<usize>,
    ) -> impl Iterator<Item = usize> + '_ {
        let end = range.end.min(self.usable.len());
        (range.start.min(end)..end).filter(move |&i| self.usable[i])
    }
}
