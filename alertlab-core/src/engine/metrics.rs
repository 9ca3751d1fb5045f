//! Run metrics: pure functions over legs and events.

use super::event_log::{equity_curve, fill_pnls};
use super::result::LegSummary;
use crate::config::CompoundingMode;
use crate::domain::SimEvent;
use serde::{Deserialize, Serialize};

/// Profit factor reported when there are wins but no losses.
const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Summary statistics for one run. A "trade" is one leg: an entry (or
/// re-entry) through its full exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimMetrics {
    /// Fraction of legs with positive PnL. `None` without legs.
    pub win_rate: Option<f64>,
    pub total_trades: usize,
    /// Largest peak-to-trough decline of the event-replayed equity curve, as
    /// a non-positive fraction (-0.2 = 20% drawdown).
    pub max_drawdown: f64,
    pub profit_factor: Option<f64>,
    pub avg_leg_pnl: Option<f64>,
    pub max_consecutive_losses: usize,
}

impl SimMetrics {
    pub fn empty() -> Self {
        Self {
            win_rate: None,
            total_trades: 0,
            max_drawdown: 0.0,
            profit_factor: None,
            avg_leg_pnl: None,
            max_consecutive_losses: 0,
        }
    }
}

pub fn compute(legs: &[LegSummary], events: &[SimEvent]) -> SimMetrics {
    let pnls: Vec<f64> = legs.iter().map(|l| l.pnl).collect();
    SimMetrics {
        win_rate: win_rate(&pnls),
        total_trades: legs.len(),
        max_drawdown: max_drawdown(&equity_curve(events)),
        profit_factor: profit_factor(&pnls),
        avg_leg_pnl: mean(&pnls),
        max_consecutive_losses: max_consecutive_losses(&pnls),
    }
}

/// Final PnL multiplier from the per-fill PnLs in `events`.
///
/// Additive: `1 + Σ pnl`. Compounded: `Π (1 + pnl)`.
pub fn final_multiplier(events: &[SimEvent], mode: CompoundingMode) -> f64 {
    let pnls = fill_pnls(events);
    match mode {
        CompoundingMode::Additive => 1.0 + pnls.iter().sum::<f64>(),
        CompoundingMode::Compounded => pnls.iter().map(|p| 1.0 + p).product(),
    }
}

/// Maximum drawdown as a negative fraction; 0.0 for flat or rising curves.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            worst = worst.min((eq - peak) / peak);
        }
    }
    worst
}

pub fn win_rate(pnls: &[f64]) -> Option<f64> {
    if pnls.is_empty() {
        return None;
    }
    let wins = pnls.iter().filter(|&&p| p > 0.0).count();
    Some(wins as f64 / pnls.len() as f64)
}

/// Gross profit / gross loss, capped at 100 when there are no losses.
pub fn profit_factor(pnls: &[f64]) -> Option<f64> {
    if pnls.is_empty() {
        return None;
    }
    let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    if gross_loss < 1e-12 {
        return Some(if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 });
    }
    Some((gross_profit / gross_loss).min(PROFIT_FACTOR_CAP))
}

pub fn max_consecutive_losses(pnls: &[f64]) -> usize {
    let mut run = 0;
    let mut longest = 0;
    for &p in pnls {
        if p < 0.0 {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
