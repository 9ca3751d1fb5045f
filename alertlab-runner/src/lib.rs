//! AlertLab Runner: batch orchestration around the simulation engine.
//!
//! This crate builds on `alertlab-core` to provide:
//! - TOML backtest files (named strategies + alerts)
//! - CSV candle loading with optional canonicalization
//! - Alert time → start index resolution
//! - Parallel (alert × strategy) batch execution with per-strategy summaries

pub mod alert;
pub mod candles;
pub mod config;
pub mod report;
pub mod runner;

pub use alert::{start_index_for, Alert, TimestampUnit};
pub use candles::{
    load_candles, load_candles_from_reader, CanonicalizeReport, LoadError, LoadOptions,
    LoadedCandles,
};
pub use config::{AlertEntry, BacktestFile, BacktestFileError};
pub use report::{BatchReport, JobResult, StrategySummary};
pub use runner::{build_jobs, run_backtest_file, run_batch, BatchJob, BatchOptions, RunError};
