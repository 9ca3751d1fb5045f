//! AlertLab Core: trade simulation engine for alert-driven backtests.
//!
//! Given an ordered window of OHLCV candles for one token and a
//! `StrategyConfig`, the engine deterministically reconstructs what a trader
//! following the strategy would have done:
//! - Entry detection (immediate, indicator signal, drop trigger, rebound trigger)
//! - Position state machine with a fixed intra-candle precedence
//!   (stop, then targets, then trailing maintenance, then time exit)
//! - Re-entry after full exits, validated against unseen stop touches
//! - Fee and slippage on every fill
//! - Ordered event log and summary metrics
//!
//! The engine performs no I/O and holds no global state. Parallelism belongs
//! to the caller.

pub mod config;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;

pub use config::{ConfigError, StrategyConfig};
pub use domain::{Candle, EventType, ExitReason, SimEvent};
pub use engine::{detect_entry, simulate, SimResult, Simulator};
