//! Configuration validation.
//!
//! Every error names the offending field by its path in the config
//! (`stop_loss.trailing_pct`, `profit_targets[2].fraction`, ...).

use super::{
    CostConfig, EntryConfig, EntrySignal, ReEntryConfig, StopLossConfig, StrategyConfig,
    TimeExitConfig, TrailingMode,
};
use thiserror::Error;

/// Tolerance when checking that target fractions sum to at most one.
const FRACTION_SUM_EPSILON: f64 = 1e-9;

/// Basis-point values at or above this would price a fill at zero or worse.
const MAX_BPS: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error(
        "profit_targets[{index}].multiple: {multiple} must be greater than the previous target's {previous}"
    )]
    TargetsNotAscending {
        index: usize,
        multiple: f64,
        previous: f64,
    },

    #[error("profit_targets: fractions sum to {sum}, which exceeds 1.0")]
    TargetFractionsExceedOne { sum: f64 },

    #[error("fill_model: unknown fill model '{0}' (expected 'open' or 'close')")]
    UnknownFillModel(String),
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Path of the field that failed validation.
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidField { field, .. } => field,
            Self::TargetsNotAscending { .. } | Self::TargetFractionsExceedOne { .. } => {
                "profit_targets"
            }
            Self::UnknownFillModel(_) => "fill_model",
        }
    }
}

pub(super) fn validate_strategy(config: &StrategyConfig) -> Result<(), ConfigError> {
    validate_entry(&config.entry)?;
    validate_targets(config)?;
    if let Some(stop) = &config.stop_loss {
        validate_stop_loss(stop)?;
    }
    if let Some(time_exit) = &config.time_exit {
        validate_time_exit(time_exit)?;
    }
    if let Some(re_entry) = &config.re_entry {
        validate_re_entry(re_entry)?;
    }
    validate_costs(&config.costs)?;
    Ok(())
}

fn require(ok: bool, field: impl Into<String>, reason: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, reason))
    }
}

/// A negative fraction strictly between -1 and 0.
fn require_drop(value: f64, field: &str) -> Result<(), ConfigError> {
    require(
        value.is_finite() && value > -1.0 && value < 0.0,
        field,
        &format!("must be in (-1, 0), got {value}"),
    )
}

fn validate_entry(entry: &EntryConfig) -> Result<(), ConfigError> {
    match entry {
        EntryConfig::Immediate => Ok(()),
        EntryConfig::Drop {
            drop_pct,
            max_wait_candles,
        } => {
            require_drop(*drop_pct, "entry.drop_pct")?;
            require(
                *max_wait_candles >= 1,
                "entry.max_wait_candles",
                "must be at least 1",
            )
        }
        EntryConfig::Rebound {
            rebound_pct,
            max_wait_candles,
        } => {
            require(
                rebound_pct.is_finite() && *rebound_pct > 0.0,
                "entry.rebound_pct",
                &format!("must be positive, got {rebound_pct}"),
            )?;
            require(
                *max_wait_candles >= 1,
                "entry.max_wait_candles",
                "must be at least 1",
            )
        }
        EntryConfig::Signal {
            signal,
            max_wait_candles,
            ..
        } => {
            if let Some(max_wait) = max_wait_candles {
                require(
                    *max_wait >= 1,
                    "entry.max_wait_candles",
                    "must be at least 1",
                )?;
            }
            validate_signal(signal)
        }
    }
}

fn validate_signal(signal: &EntrySignal) -> Result<(), ConfigError> {
    match signal {
        EntrySignal::RsiBelow { period, threshold } | EntrySignal::RsiAbove { period, threshold } => {
            require(*period >= 1, "entry.signal.period", "must be at least 1")?;
            require(
                threshold.is_finite() && (0.0..=100.0).contains(threshold),
                "entry.signal.threshold",
                &format!("must be in [0, 100], got {threshold}"),
            )
        }
        EntrySignal::EmaCrossUp { fast, slow } => {
            require(*fast >= 1, "entry.signal.fast", "must be at least 1")?;
            require(
                fast < slow,
                "entry.signal.slow",
                &format!("must be greater than fast ({fast}), got {slow}"),
            )
        }
        EntrySignal::CloseAboveSma { period } => {
            require(*period >= 1, "entry.signal.period", "must be at least 1")
        }
    }
}

fn validate_targets(config: &StrategyConfig) -> Result<(), ConfigError> {
    let mut previous: Option<f64> = None;
    let mut sum = 0.0;
    for (index, target) in config.profit_targets.iter().enumerate() {
        require(
            target.multiple.is_finite() && target.multiple > 1.0,
            format!("profit_targets[{index}].multiple"),
            &format!("must be a finite multiple above 1.0, got {}", target.multiple),
        )?;
        require(
            target.fraction.is_finite() && target.fraction > 0.0 && target.fraction <= 1.0,
            format!("profit_targets[{index}].fraction"),
            &format!("must be in (0, 1], got {}", target.fraction),
        )?;
        if let Some(prev) = previous {
            if target.multiple <= prev {
                return Err(ConfigError::TargetsNotAscending {
                    index,
                    multiple: target.multiple,
                    previous: prev,
                });
            }
        }
        previous = Some(target.multiple);
        sum += target.fraction;
    }
    if sum > 1.0 + FRACTION_SUM_EPSILON {
        return Err(ConfigError::TargetFractionsExceedOne { sum });
    }
    Ok(())
}

fn validate_stop_loss(stop: &StopLossConfig) -> Result<(), ConfigError> {
    if let Some(initial) = stop.initial_pct {
        require_drop(initial, "stop_loss.initial_pct")?;
    }
    if stop.trailing_enabled() {
        require(
            stop.trailing_pct.is_finite() && stop.trailing_pct > 0.0 && stop.trailing_pct < 1.0,
            "stop_loss.trailing_pct",
            &format!("must be in (0, 1), got {}", stop.trailing_pct),
        )?;
        require(
            stop.activation_pct.is_finite() && stop.activation_pct >= 0.0,
            "stop_loss.activation_pct",
            &format!("must be non-negative, got {}", stop.activation_pct),
        )?;
    }
    if stop.trailing_mode == TrailingMode::RollingHigh {
        require(
            stop.rolling_window >= 1,
            "stop_loss.rolling_window",
            "must be at least 1",
        )?;
    }
    Ok(())
}

fn validate_time_exit(time_exit: &TimeExitConfig) -> Result<(), ConfigError> {
    require(
        time_exit.max_candles_in_trade >= 1,
        "time_exit.max_candles_in_trade",
        "must be at least 1",
    )
}

fn validate_re_entry(re_entry: &ReEntryConfig) -> Result<(), ConfigError> {
    require_drop(re_entry.trigger_drop_pct, "re_entry.trigger_drop_pct")?;
    require(
        re_entry.size_fraction.is_finite()
            && re_entry.size_fraction > 0.0
            && re_entry.size_fraction <= 1.0,
        "re_entry.size_fraction",
        &format!("must be in (0, 1], got {}", re_entry.size_fraction),
    )
}

fn validate_costs(costs: &CostConfig) -> Result<(), ConfigError> {
    let fields = [
        ("costs.entry_fee_bps", costs.entry_fee_bps),
        ("costs.exit_fee_bps", costs.exit_fee_bps),
        ("costs.entry_slippage_bps", costs.entry_slippage_bps),
        ("costs.exit_slippage_bps", costs.exit_slippage_bps),
    ];
    for (field, bps) in fields {
        require(
            bps.is_finite() && (0.0..MAX_BPS).contains(&bps),
            field,
            &format!("must be in [0, {MAX_BPS}), got {bps}"),
        )?;
    }
    Ok(())
}
