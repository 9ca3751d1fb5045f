//! Simulator: drives one run from candles and a strategy to a `SimResult`.
//!
//! Run states: `NoPosition → InPosition → (ReEntryWait ⇄ InPosition)* → Closed`.
//! A run is a single forward scan with no I/O and no shared state, so any
//! number of runs may execute in parallel and each is bit-for-bit
//! reproducible.

use super::entry::{detect_entry_masked, EntryOutcome};
use super::event_log::EventLog;
use super::metrics;
use super::position_machine::{CandleOutcome, ClosedLeg, PositionMachine};
use super::quality::UsableMask;
use super::reentry::{ReEntryController, ReEntryDecision};
use super::result::{LegSummary, NoTradeReason, RunOutcome, SimResult};
use crate::config::{ConfigError, StrategyConfig};
use crate::domain::Candle;
use crate::fingerprint;
use tracing::{debug, debug_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NoPosition,
    InPosition,
    ReEntryWait,
    Closed,
}

/// A validated strategy, ready to run against any number of candle windows.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: StrategyConfig,
}

impl Simulator {
    /// Validate `config`. Nothing runs if it is invalid.
    pub fn new(config: &StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn run(&self, candles: &[Candle], start_index: usize) -> SimResult {
        let run_id = fingerprint::run_id(&self.config, candles, start_index);
        let span = debug_span!("simulate", run_id = run_id.short(), candles = candles.len(), start_index);
        let _guard = span.enter();

        let mask = UsableMask::scan(candles);
        let quality = mask.quality();

        if candles.is_empty() {
            return SimResult::no_trade(run_id, NoTradeReason::EmptyInput, 0, quality);
        }
        if start_index >= candles.len() {
            return SimResult::no_trade(run_id, NoTradeReason::StartOutOfRange, 0, quality);
        }

        let fill = match detect_entry_masked(
            candles,
            &mask,
            start_index,
            &self.config.entry,
            self.config.fill_model,
        ) {
            EntryOutcome::Enter(fill) => fill,
            EntryOutcome::NoEntry { reason } => {
                return SimResult::no_trade(
                    run_id,
                    NoTradeReason::NoEntry(reason),
                    candles.len() - start_index,
                    quality,
                );
            }
        };

        let mut log = EventLog::new();
        let mut machine = PositionMachine::new(&self.config);
        let mut reentry = ReEntryController::new(self.config.re_entry);
        let mut legs: Vec<LegSummary> = Vec::new();
        let mut state = RunState::NoPosition;

        machine.open(0, &fill, 1.0, &mut log);
        transition(&mut state, RunState::InPosition, fill.candle_index);
        let mut last_seen = fill.candle_index;

        for (index, candle) in candles.iter().enumerate().skip(fill.candle_index + 1) {
            if state == RunState::Closed {
                break;
            }
            last_seen = index;
            if !mask.is_usable(index) {
                continue;
            }
            match state {
                RunState::InPosition => {
                    if let CandleOutcome::Closed(closed) = machine.on_candle(index, candle, &mut log) {
                        let next = after_close(&closed, &mut reentry, &mut log);
                        legs.push(closed.summary);
                        transition(&mut state, next, index);
                    }
                }
                RunState::ReEntryWait => match reentry.on_candle(candles, &mask, index, &mut log) {
                    ReEntryDecision::Wait => {}
                    ReEntryDecision::Enter(fill) => {
                        machine.open(legs.len(), &fill, reentry.size_fraction(), &mut log);
                        transition(&mut state, RunState::InPosition, index);
                    }
                    ReEntryDecision::Reject { .. } => {
                        transition(&mut state, RunState::Closed, index);
                    }
                },
                RunState::NoPosition | RunState::Closed => {}
            }
        }

        // End of data
        let last_usable = mask.last_usable().unwrap_or(fill.candle_index);
        match state {
            RunState::InPosition => {
                if let Some(closed) = machine.force_exit(last_usable, &candles[last_usable], &mut log) {
                    legs.push(closed.summary);
                }
                transition(&mut state, RunState::Closed, last_usable);
            }
            RunState::ReEntryWait => {
                reentry.expire(last_usable, candles[last_usable].timestamp, &mut log);
                transition(&mut state, RunState::Closed, last_usable);
            }
            RunState::NoPosition | RunState::Closed => {}
        }

        let events = log.into_events();
        let final_pnl_multiplier = metrics::final_multiplier(&events, self.config.compounding);
        let metrics = metrics::compute(&legs, &events);
        let entry_price = events.first().map(|e| e.price);
        let final_price = events.iter().rev().find(|e| e.is_exit_fill()).map(|e| e.price);
        let cumulative_pnl = events.last().map_or(0.0, |e| e.cumulative_pnl);

        debug!(
            legs = legs.len(),
            final_pnl_multiplier,
            events = events.len(),
            "simulation complete"
        );

        SimResult {
            run_id,
            outcome: RunOutcome::Traded,
            entry_price,
            final_price,
            total_candles_considered: last_seen + 1 - start_index,
            final_pnl_multiplier,
            cumulative_pnl,
            events,
            metrics,
            data_quality: quality,
            legs,
        }
    }
}

/// Validate and run in one call.
pub fn simulate(
    candles: &[Candle],
    start_index: usize,
    config: &StrategyConfig,
) -> Result<SimResult, ConfigError> {
    Ok(Simulator::new(config)?.run(candles, start_index))
}

fn after_close(closed: &ClosedLeg, reentry: &mut ReEntryController, log: &mut EventLog) -> RunState {
    if reentry.arm(closed, log) {
        RunState::ReEntryWait
    } else {
        RunState::Closed
    }
}

fn transition(state: &mut RunState, next: RunState, index: usize) {
    if *state != next {
        debug!(from = ?state, to = ?next, index, "state transition");
        *state = next;
    }
}
