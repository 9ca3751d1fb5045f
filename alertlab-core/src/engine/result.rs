//! Simulation output types.

use super::entry::NoEntryReason;
use super::metrics::SimMetrics;
use super::quality::DataQuality;
use crate::domain::{EventType, ExitReason, RunId, SimEvent};
use serde::{Deserialize, Serialize};

/// Why a run produced no trade. Not an error: a neutral, ordinary result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoTradeReason {
    EmptyInput,
    StartOutOfRange,
    NoEntry(NoEntryReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunOutcome {
    Traded,
    NoTrade(NoTradeReason),
}

/// One completed entry-to-exit cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegSummary {
    pub leg: usize,
    pub entry_index: usize,
    pub exit_index: usize,
    /// Cost-adjusted.
    pub entry_price: f64,
    /// Opened fraction of the original unit.
    pub size: f64,
    /// Realized PnL over all fills of this leg.
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl LegSummary {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

/// Final output of one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimResult {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    /// Cost-adjusted price of the first entry.
    pub entry_price: Option<f64>,
    /// Cost-adjusted price of the last exit fill.
    pub final_price: Option<f64>,
    /// Candles from the start index through the last candle the run examined.
    pub total_candles_considered: usize,
    pub final_pnl_multiplier: f64,
    pub cumulative_pnl: f64,
    pub events: Vec<SimEvent>,
    pub metrics: SimMetrics,
    pub data_quality: DataQuality,
    pub legs: Vec<LegSummary>,
}

impl SimResult {
    pub(crate) fn no_trade(
        run_id: RunId,
        reason: NoTradeReason,
        total_candles_considered: usize,
        data_quality: DataQuality,
    ) -> Self {
        Self {
            run_id,
            outcome: RunOutcome::NoTrade(reason),
            entry_price: None,
            final_price: None,
            total_candles_considered,
            final_pnl_multiplier: 1.0,
            cumulative_pnl: 0.0,
            events: Vec::new(),
            metrics: SimMetrics::empty(),
            data_quality,
            legs: Vec::new(),
        }
    }

    pub fn traded(&self) -> bool {
        self.outcome == RunOutcome::Traded
    }

    pub fn no_trade_reason(&self) -> Option<NoTradeReason> {
        match self.outcome {
            RunOutcome::Traded => None,
            RunOutcome::NoTrade(reason) => Some(reason),
        }
    }

    pub fn events_of(&self, event_type: EventType) -> impl Iterator<Item = &SimEvent> {
        self.events
            .iter()
            .filter(move |e| e.event_type() == event_type)
    }

    /// Event types in log order, for compact assertions.
    pub fn event_types(&self) -> Vec<EventType> {
        self.events.iter().map(|e| e.event_type()).collect()
    }

    /// Exit reasons of all `EXIT_FULL` events, in order.
    pub fn exit_reasons(&self) -> Vec<ExitReason> {
        self.events.iter().filter_map(|e| e.exit_reason()).collect()
    }
}
