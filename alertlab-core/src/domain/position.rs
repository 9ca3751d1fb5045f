//! Position: the single open leg owned by the position state machine.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Residual fraction below which a position counts as fully closed.
pub const FRACTION_EPSILON: f64 = 1e-9;

/// What set the current stop level. Determines the exit reason when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Initial,
    BreakEven,
    Trailing,
}

/// One leg of a trade: the initial entry or a re-entry.
///
/// Created on an entry fill, mutated only by the state machine, and logically
/// destroyed when `remaining_fraction` reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 0 for the initial entry, 1.. for re-entries.
    pub leg: usize,
    /// Cost-adjusted entry fill price. PnL is measured against this.
    pub entry_price: f64,
    /// Uncosted market price at entry. The initial stop derives from this;
    /// targets and break-even use `entry_price`.
    pub entry_reference: f64,
    pub entry_index: usize,
    pub entry_timestamp: i64,
    /// Fraction of the original unit opened by this leg.
    pub size: f64,
    pub remaining_fraction: f64,
    pub stop_price: Option<f64>,
    pub stop_kind: StopKind,
    pub high_watermark: f64,
    pub next_target_index: usize,
    pub trailing_active: bool,
    pub break_even_applied: bool,
    /// Realized PnL of this leg so far, in units of the original position.
    pub realized_pnl: f64,
    /// Recent candle highs for rolling-window trailing.
    pub rolling_highs: VecDeque<f64>,
}

impl Position {
    pub fn open(
        leg: usize,
        entry_price: f64,
        entry_reference: f64,
        entry_index: usize,
        entry_timestamp: i64,
        size: f64,
    ) -> Self {
        Self {
            leg,
            entry_price,
            entry_reference,
            entry_index,
            entry_timestamp,
            size,
            remaining_fraction: size,
            stop_price: None,
            stop_kind: StopKind::Initial,
            high_watermark: entry_reference,
            next_target_index: 0,
            trailing_active: false,
            break_even_applied: false,
            realized_pnl: 0.0,
            rolling_highs: VecDeque::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.remaining_fraction > FRACTION_EPSILON
    }

    /// Candles elapsed since the entry candle, counting unusable ones.
    pub fn age(&self, candle_index: usize) -> usize {
        candle_index.saturating_sub(self.entry_index)
    }

    /// PnL of exiting `quantity` at a cost-adjusted `fill_price`.
    pub fn pnl_for(&self, quantity: f64, fill_price: f64) -> f64 {
        if self.entry_price <= 0.0 || !fill_price.is_finite() {
            return 0.0;
        }
        quantity * (fill_price / self.entry_price - 1.0)
    }

    /// Raise the stop to `candidate` if that tightens it.
    ///
    /// Stops only move up for a long position. Returns the previous level
    /// when the stop moved, `None` when the candidate was rejected.
    pub fn raise_stop(&mut self, candidate: f64, kind: StopKind) -> Option<Option<f64>> {
        if !candidate.is_finite() || candidate <= 0.0 {
            return None;
        }
        match self.stop_price {
            Some(current) if candidate <= current => None,
            previous => {
                self.stop_price = Some(candidate);
                self.stop_kind = kind;
                Some(previous)
            }
        }
    }

    /// Record a candle high in the watermark and rolling window.
    pub fn observe_high(&mut self, high: f64, rolling_window: usize) {
        if high > self.high_watermark {
            self.high_watermark = high;
        }
        if rolling_window > 0 {
            self.rolling_highs.push_back(high);
            while self.rolling_highs.len() > rolling_window {
                self.rolling_highs.pop_front();
            }
        }
    }

    /// Highest high in the rolling window, or the entry reference before any
    /// candle has been observed.
    pub fn rolling_high(&self) -> f64 {
        self.rolling_highs
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(self.entry_reference)
    }

    /// Take `quantity` out of the position, snapping residual dust to zero.
    pub fn reduce(&mut self, quantity: f64) {
        self.remaining_fraction -= quantity;
        if self.remaining_fraction < FRACTION_EPSILON {
            self.remaining_fraction = 0.0;
        }
    }
}
