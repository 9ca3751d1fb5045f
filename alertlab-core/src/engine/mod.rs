//! Trade simulation engine.
//!
//! Leaves first: the cost model prices fills, the entry detector finds the
//! entry, the position state machine walks the open leg forward, the re-entry
//! controller decides what happens after a full exit, and the event log plus
//! metrics turn the transitions into a `SimResult`. `Simulator` wires them
//! together.

pub mod cost_model;
pub mod entry;
pub mod event_log;
pub mod metrics;
pub mod position_machine;
pub mod quality;
pub mod reentry;
pub mod result;
pub mod simulator;

pub use cost_model::{entry_fill_price, exit_fill_price, CostModel};
pub use entry::{detect_entry, EntryFill, EntryOutcome, NoEntryReason};
pub use event_log::EventLog;
pub use metrics::SimMetrics;
pub use position_machine::{CandleOutcome, ClosedLeg, PositionMachine};
pub use quality::{DataQuality, UsableMask};
pub use reentry::{ReEntryController, ReEntryDecision, ReEntryWait};
pub use result::{LegSummary, NoTradeReason, RunOutcome, SimResult};
pub use simulator::{simulate, RunState, Simulator};
