//! Entry detector: locates at most one entry from a start index.
//!
//! Pure function of its inputs. Returns the *uncosted* trigger price; the
//! simulator runs it through the buy-side cost model before opening the
//! position.
//!
//! The start price is the decision price of the first usable candle at or
//! after `start_index` (the anchor). Wait windows cover the anchor plus the
//! next `max_wait_candles` candle indices. With the open fill model the
//! anchor's own range is still ahead of the trader and is scanned; with the
//! close model scanning begins on the following candle.

use super::quality::UsableMask;
use crate::config::{EntryConfig, EntrySignal, FillModel};
use crate::domain::{Candle, EntryKind};
use crate::indicators::signal_series;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A located entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryFill {
    /// Uncosted trigger price.
    pub price: f64,
    pub candle_index: usize,
    pub timestamp: i64,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoEntryReason {
    NoCandles,
    StartOutOfRange,
    /// No usable candle at or after the start index.
    NoUsableCandle,
    /// Drop or rebound trigger was not reached inside the wait window.
    TriggerNotReached,
    SignalNotFired,
    /// The signal fired, but its delayed execution candle is past the data.
    ScheduledOutOfBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    Enter(EntryFill),
    NoEntry { reason: NoEntryReason },
}

impl EntryOutcome {
    fn none(reason: NoEntryReason) -> Self {
        Self::NoEntry { reason }
    }

    pub fn should_enter(&self) -> bool {
        matches!(self, Self::Enter(_))
    }

    pub fn fill(&self) -> Option<&EntryFill> {
        match self {
            Self::Enter(fill) => Some(fill),
            Self::NoEntry { .. } => None,
        }
    }

    pub fn price(&self) -> Option<f64> {
        self.fill().map(|f| f.price)
    }

    pub fn candle_index(&self) -> Option<usize> {
        self.fill().map(|f| f.candle_index)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.fill().map(|f| f.timestamp)
    }

    pub fn kind(&self) -> Option<EntryKind> {
        self.fill().map(|f| f.kind)
    }

    pub fn no_entry_reason(&self) -> Option<NoEntryReason> {
        match self {
            Self::Enter(_) => None,
            Self::NoEntry { reason } => Some(*reason),
        }
    }
}

/// Find the entry for `entry` starting at `start_index`.
pub fn detect_entry(
    candles: &[Candle],
    start_index: usize,
    entry: &EntryConfig,
    fill_model: FillModel,
) -> EntryOutcome {
    let mask = UsableMask::scan(candles);
    detect_entry_masked(candles, &mask, start_index, entry, fill_model)
}

/// `detect_entry` with a precomputed usability mask.
pub(crate) fn detect_entry_masked(
    candles: &[Candle],
    mask: &UsableMask,
    start_index: usize,
    entry: &EntryConfig,
    fill_model: FillModel,
) -> EntryOutcome {
    if candles.is_empty() {
        return EntryOutcome::none(NoEntryReason::NoCandles);
    }
    if start_index >= candles.len() {
        return EntryOutcome::none(NoEntryReason::StartOutOfRange);
    }
    let Some(anchor) = mask.next_usable(start_index) else {
        return EntryOutcome::none(NoEntryReason::NoUsableCandle);
    };
    let start_price = candles[anchor].decision_price(fill_model);
    let scan_from = fill_model.first_intrabar_index(anchor);

    let outcome = match entry {
        EntryConfig::Immediate => enter(candles, anchor, start_price, EntryKind::Immediate),
        EntryConfig::Drop {
            drop_pct,
            max_wait_candles,
        } => {
            let trigger = start_price * (1.0 + drop_pct);
            let window = scan_from..window_end(candles, anchor, *max_wait_candles);
            mask.usable_in(window)
                .find(|&i| candles[i].low <= trigger)
                .map(|i| enter(candles, i, trigger, EntryKind::Drop))
                .unwrap_or(EntryOutcome::none(NoEntryReason::TriggerNotReached))
        }
        EntryConfig::Rebound {
            rebound_pct,
            max_wait_candles,
        } => {
            let window = scan_from..window_end(candles, anchor, *max_wait_candles);
            detect_rebound(candles, mask, window, *rebound_pct)
        }
        EntryConfig::Signal {
            signal,
            delay_candles,
            max_wait_candles,
        } => detect_signal(
            candles,
            mask,
            anchor,
            signal,
            *delay_candles,
            *max_wait_candles,
            fill_model,
        ),
    };

    match &outcome {
        EntryOutcome::Enter(fill) => debug!(
            kind = ?fill.kind,
            index = fill.candle_index,
            price = fill.price,
            "entry located"
        ),
        EntryOutcome::NoEntry { reason } => debug!(?reason, start_index, "no entry"),
    }
    outcome
}

fn enter(candles: &[Candle], index: usize, price: f64, kind: EntryKind) -> EntryOutcome {
    EntryOutcome::Enter(EntryFill {
        price,
        candle_index: index,
        timestamp: candles[index].timestamp,
        kind,
    })
}

/// Exclusive end of a wait window anchored at `anchor`.
fn window_end(candles: &[Candle], anchor: usize, max_wait_candles: usize) -> usize {
    anchor
        .saturating_add(max_wait_candles)
        .saturating_add(1)
        .min(candles.len())
}

/// Enter once a candle's high reaches `lowest_low * (1 + rebound_pct)`.
///
/// A candle's own low only counts toward its rebound when the OHLC path
/// heuristic puts the low before the high. Falls back to the last usable
/// close in the window when no rebound happens.
fn detect_rebound(
    candles: &[Candle],
    mask: &UsableMask,
    window: std::ops::Range<usize>,
    rebound_pct: f64,
) -> EntryOutcome {
    let mut lowest: Option<f64> = None;
    let mut last_usable: Option<usize> = None;

    for i in mask.usable_in(window) {
        let c = &candles[i];
        if c.low_first() {
            lowest = Some(lowest.map_or(c.low, |l| l.min(c.low)));
        }
        if let Some(low) = lowest {
            let trigger = low * (1.0 + rebound_pct);
            if c.high >= trigger {
                return enter(candles, i, trigger, EntryKind::Rebound);
            }
        }
        lowest = Some(lowest.map_or(c.low, |l| l.min(c.low)));
        last_usable = Some(i);
    }

    match last_usable {
        Some(i) => enter(candles, i, candles[i].close, EntryKind::ReboundFallback),
        None => EntryOutcome::none(NoEntryReason::TriggerNotReached),
    }
}

/// Indicators run over every usable candle from the start of the slice, so
/// history before the anchor serves as warmup. A signal at position `i`
/// executes at `i + delay`; with the open fill model a zero delay becomes
/// one, since the firing close is not known at that candle's open.
fn detect_signal(
    candles: &[Candle],
    mask: &UsableMask,
    anchor: usize,
    signal: &EntrySignal,
    delay_candles: usize,
    max_wait_candles: Option<usize>,
    fill_model: FillModel,
) -> EntryOutcome {
    let indices: Vec<usize> = mask.usable_in(0..candles.len()).collect();
    let closes: Vec<f64> = indices.iter().map(|&i| candles[i].close).collect();
    let fired = signal_series(signal, &closes);

    let scan_end = match max_wait_candles {
        Some(wait) => window_end(candles, anchor, wait),
        None => candles.len(),
    };
    let delay = match fill_model {
        FillModel::Open => delay_candles.max(1),
        FillModel::Close => delay_candles,
    };

    let Some(signal_index) = indices
        .iter()
        .zip(&fired)
        .find(|&(&i, &f)| f && i >= anchor && i < scan_end)
        .map(|(&i, _)| i)
    else {
        return EntryOutcome::none(NoEntryReason::SignalNotFired);
    };

    let scheduled = signal_index + delay;
    if scheduled >= candles.len() {
        return EntryOutcome::none(NoEntryReason::ScheduledOutOfBounds);
    }
    match mask.next_usable(scheduled) {
        Some(exec) => enter(
            candles,
            exec,
            candles[exec].decision_price(fill_model),
            EntryKind::Signal,
        ),
        None => EntryOutcome::none(NoEntryReason::ScheduledOutOfBounds),
    }
}
