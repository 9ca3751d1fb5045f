//! Simulation events: the append-only, replayable record of a run.
//!
//! Every state transition the engine makes is one `SimEvent`. The common
//! numeric fields live on the event; the fields that only make sense for one
//! transition type live on its `EventKind` variant.

use super::position::StopKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a leg was fully closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    BreakEvenStop,
    TargetsDone,
    TimeExit,
    EndOfData,
}

impl ExitReason {
    pub fn from_stop(kind: StopKind) -> Self {
        match kind {
            StopKind::Initial => Self::StopLoss,
            StopKind::BreakEven => Self::BreakEvenStop,
            StopKind::Trailing => Self::TrailingStop,
        }
    }

    pub fn is_stop(self) -> bool {
        matches!(
            self,
            Self::StopLoss | Self::TrailingStop | Self::BreakEvenStop
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TrailingStop => "trailing_stop",
            Self::BreakEvenStop => "break_even_stop",
            Self::TargetsDone => "targets_done",
            Self::TimeExit => "time_exit",
            Self::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an entry price was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Immediate,
    Signal,
    Drop,
    Rebound,
    /// Rebound window elapsed without a rebound; entered at the last close.
    ReboundFallback,
    ReEntry,
}

/// Transition type, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    EntryFilled,
    TargetHit,
    PartialExit,
    StopMoved,
    TrailingActivated,
    ExitFull,
    ReEntryArmed,
    ReEntryFilled,
    ReEntryRejected,
    ReEntryExpired,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EntryFilled => "ENTRY_FILLED",
            Self::TargetHit => "TARGET_HIT",
            Self::PartialExit => "PARTIAL_EXIT",
            Self::StopMoved => "STOP_MOVED",
            Self::TrailingActivated => "TRAILING_ACTIVATED",
            Self::ExitFull => "EXIT_FULL",
            Self::ReEntryArmed => "RE_ENTRY_ARMED",
            Self::ReEntryFilled => "RE_ENTRY_FILLED",
            Self::ReEntryRejected => "RE_ENTRY_REJECTED",
            Self::ReEntryExpired => "RE_ENTRY_EXPIRED",
        };
        f.write_str(s)
    }
}

/// Typed payload per transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    EntryFilled {
        entry_kind: EntryKind,
        /// Uncosted market price the entry was triggered at.
        reference_price: f64,
    },
    TargetHit {
        target_index: usize,
        multiple: f64,
        target_price: f64,
    },
    PartialExit {
        target_index: usize,
    },
    StopMoved {
        previous: Option<f64>,
        stop: f64,
        cause: StopKind,
    },
    TrailingActivated {
        watermark: f64,
        stop: f64,
    },
    ExitFull {
        reason: ExitReason,
    },
    ReEntryArmed {
        trigger_price: f64,
        /// Stop level active when the previous leg closed.
        stop_at_exit: Option<f64>,
        re_entries_used: usize,
    },
    ReEntryFilled {
        trigger_price: f64,
    },
    ReEntryRejected {
        breach_index: usize,
        breach_low: f64,
        stop_at_exit: f64,
    },
    ReEntryExpired {
        trigger_price: f64,
    },
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::EntryFilled { .. } => EventType::EntryFilled,
            Self::TargetHit { .. } => EventType::TargetHit,
            Self::PartialExit { .. } => EventType::PartialExit,
            Self::StopMoved { .. } => EventType::StopMoved,
            Self::TrailingActivated { .. } => EventType::TrailingActivated,
            Self::ExitFull { .. } => EventType::ExitFull,
            Self::ReEntryArmed { .. } => EventType::ReEntryArmed,
            Self::ReEntryFilled { .. } => EventType::ReEntryFilled,
            Self::ReEntryRejected { .. } => EventType::ReEntryRejected,
            Self::ReEntryExpired { .. } => EventType::ReEntryExpired,
        }
    }
}

/// One entry in the event log.
///
/// Quantities are fractions of the original position unit; `notional` is
/// `quantity_fraction * price` for that unit. `cumulative_pnl` is the running
/// sum of `realized_pnl` over the whole run, maintained by the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub kind: EventKind,
    pub leg: usize,
    pub candle_index: usize,
    pub timestamp: i64,
    pub price: f64,
    pub quantity_fraction: f64,
    pub notional: f64,
    pub fee: f64,
    pub realized_pnl: Option<f64>,
    pub cumulative_pnl: f64,
    pub remaining_fraction: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl SimEvent {
    /// An event with no quantity attached (markers, stop moves, re-entry state).
    pub fn marker(
        kind: EventKind,
        leg: usize,
        candle_index: usize,
        timestamp: i64,
        price: f64,
        remaining_fraction: f64,
    ) -> Self {
        Self {
            kind,
            leg,
            candle_index,
            timestamp,
            price,
            quantity_fraction: 0.0,
            notional: 0.0,
            fee: 0.0,
            realized_pnl: None,
            cumulative_pnl: 0.0,
            remaining_fraction,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a fill. `realized_pnl` is `None` for entries.
    pub fn with_fill(mut self, quantity: f64, fee: f64, realized_pnl: Option<f64>) -> Self {
        self.quantity_fraction = quantity;
        self.notional = quantity * self.price;
        self.fee = fee;
        self.realized_pnl = realized_pnl;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Entry and exit events that move quantity.
    pub fn is_fill(&self) -> bool {
        self.quantity_fraction > 0.0
    }

    pub fn is_exit_fill(&self) -> bool {
        self.is_fill() && self.realized_pnl.is_some()
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        match self.kind {
            EventKind::ExitFull { reason } => Some(reason),
            _ => None,
        }
    }
}
