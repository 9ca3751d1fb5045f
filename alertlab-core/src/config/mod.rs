//! Strategy configuration: the only tunable surface of the engine.
//!
//! A `StrategyConfig` fully specifies one simulation: how to enter, the
//! profit-target ladder, stop-loss and trailing behavior, the time exit,
//! re-entry rules, and trading costs. It is immutable for the lifetime of a
//! run and is validated once, before any candle is processed.
//!
//! Sign conventions: drop-style fractions (`initial_pct`, `drop_pct`,
//! `trigger_drop_pct`) are negative; rise-style fractions (`rebound_pct`,
//! `trailing_pct`, `activation_pct`) are positive.

mod validate;

pub use validate::ConfigError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which candle price is used for non-wick actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillModel {
    /// Act at the candle's open.
    #[default]
    Open,
    /// Act at the candle's close.
    Close,
}

impl FillModel {
    /// First candle index whose intrabar range lies after a decision taken on
    /// `start`. With the open model the rest of the start candle is still
    /// ahead; with the close model it is already history.
    pub fn first_intrabar_index(self, start: usize) -> usize {
        match self {
            Self::Open => start,
            Self::Close => start + 1,
        }
    }
}

impl FromStr for FillModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "close" => Ok(Self::Close),
            _ => Err(ConfigError::UnknownFillModel(s.to_string())),
        }
    }
}

impl fmt::Display for FillModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// Entry rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryConfig {
    /// Enter at the decision price of the start candle.
    #[default]
    Immediate,
    /// Enter when an indicator signal fires, optionally `delay_candles` later.
    Signal {
        signal: EntrySignal,
        #[serde(default)]
        delay_candles: usize,
        /// Stop scanning for the signal after this many candles.
        #[serde(default)]
        max_wait_candles: Option<usize>,
    },
    /// Enter at `start * (1 + drop_pct)` once a candle low touches it.
    Drop {
        drop_pct: f64,
        max_wait_candles: usize,
    },
    /// Enter once price rebounds `rebound_pct` off the lowest low of the window.
    Rebound {
        rebound_pct: f64,
        max_wait_candles: usize,
    },
}

/// Indicator conditions available to signal-based entries.
///
/// All are evaluated on candle closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntrySignal {
    RsiBelow { period: usize, threshold: f64 },
    RsiAbove { period: usize, threshold: f64 },
    /// Fast EMA crosses above the slow EMA.
    EmaCrossUp { fast: usize, slow: usize },
    /// Close crosses above its simple moving average.
    CloseAboveSma { period: usize },
}

/// One rung of the profit-target ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitTarget {
    /// Target price as a multiple of the entry price (2.0 = a double).
    pub multiple: f64,
    /// Fraction of the leg's opened size to sell at this target.
    pub fraction: f64,
}

impl ProfitTarget {
    pub fn new(multiple: f64, fraction: f64) -> Self {
        Self { multiple, fraction }
    }
}

/// How the trailing stop derives its reference high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingMode {
    #[default]
    Off,
    /// Trail below the highest high since entry.
    Watermark,
    /// Trail below the highest high of the last `rolling_window` candles.
    RollingHigh,
}

/// Stop-loss, trailing-stop, and break-even behavior.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StopLossConfig {
    /// Initial stop as a (negative) fraction from entry; `-0.2` = 20% below.
    pub initial_pct: Option<f64>,
    pub trailing_mode: TrailingMode,
    /// Trail distance below the reference high (0.1 = 10%).
    pub trailing_pct: f64,
    /// Unrealized profit at the candle high required to activate trailing.
    pub activation_pct: f64,
    /// Number of recent highs considered by `TrailingMode::RollingHigh`.
    pub rolling_window: usize,
    /// Raise the stop to the entry price after the first target fills.
    pub break_even_after_first_target: bool,
}

impl StopLossConfig {
    /// A plain fixed stop, no trailing.
    pub fn fixed(initial_pct: f64) -> Self {
        Self {
            initial_pct: Some(initial_pct),
            ..Self::default()
        }
    }

    /// A watermark trailing stop with no initial stop.
    pub fn trailing(trailing_pct: f64, activation_pct: f64) -> Self {
        Self {
            trailing_mode: TrailingMode::Watermark,
            trailing_pct,
            activation_pct,
            ..Self::default()
        }
    }

    pub fn with_initial(mut self, initial_pct: f64) -> Self {
        self.initial_pct = Some(initial_pct);
        self
    }

    pub fn with_rolling_window(mut self, window: usize) -> Self {
        self.trailing_mode = TrailingMode::RollingHigh;
        self.rolling_window = window;
        self
    }

    pub fn with_break_even(mut self) -> Self {
        self.break_even_after_first_target = true;
        self
    }

    pub fn trailing_enabled(&self) -> bool {
        self.trailing_mode != TrailingMode::Off
    }
}

/// Force a full exit after a position has been held this many candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeExitConfig {
    pub max_candles_in_trade: usize,
}

/// Rules for re-establishing a position after a full exit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReEntryConfig {
    /// Trigger as a (negative) fraction from the exit price.
    pub trigger_drop_pct: f64,
    /// Size of each re-entry leg as a fraction of the original unit.
    pub size_fraction: f64,
    pub max_re_entries: usize,
    /// Candles that must elapse after the exit before a re-entry may fill.
    #[serde(default)]
    pub cooldown_candles: usize,
}

/// Fees and slippage in basis points, per side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostConfig {
    pub entry_fee_bps: f64,
    pub exit_fee_bps: f64,
    pub entry_slippage_bps: f64,
    pub exit_slippage_bps: f64,
}

impl CostConfig {
    pub fn frictionless() -> Self {
        Self::default()
    }

    /// Same fee and slippage on both sides.
    pub fn symmetric(fee_bps: f64, slippage_bps: f64) -> Self {
        Self {
            entry_fee_bps: fee_bps,
            exit_fee_bps: fee_bps,
            entry_slippage_bps: slippage_bps,
            exit_slippage_bps: slippage_bps,
        }
    }
}

/// How per-fill PnLs combine into the final multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompoundingMode {
    /// `1 + Σ pnl`
    #[default]
    Additive,
    /// `Π (1 + pnl)`
    Compounded,
}

/// Complete strategy configuration for one simulation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyConfig {
    pub entry: EntryConfig,
    pub fill_model: FillModel,
    /// Ascending by multiple.
    pub profit_targets: Vec<ProfitTarget>,
    pub stop_loss: Option<StopLossConfig>,
    pub time_exit: Option<TimeExitConfig>,
    pub re_entry: Option<ReEntryConfig>,
    pub costs: CostConfig,
    pub compounding: CompoundingMode,
}

impl StrategyConfig {
    /// Immediate entry, no exits: holds to end of data.
    pub fn hold() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: EntryConfig) -> Self {
        self.entry = entry;
        self
    }

    pub fn with_fill_model(mut self, fill_model: FillModel) -> Self {
        self.fill_model = fill_model;
        self
    }

    pub fn with_targets(mut self, targets: Vec<ProfitTarget>) -> Self {
        self.profit_targets = targets;
        self
    }

    pub fn with_stop_loss(mut self, stop_loss: StopLossConfig) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_time_exit(mut self, max_candles_in_trade: usize) -> Self {
        self.time_exit = Some(TimeExitConfig {
            max_candles_in_trade,
        });
        self
    }

    pub fn with_re_entry(mut self, re_entry: ReEntryConfig) -> Self {
        self.re_entry = Some(re_entry);
        self
    }

    pub fn with_costs(mut self, costs: CostConfig) -> Self {
        self.costs = costs;
        self
    }

    pub fn with_compounding(mut self, compounding: CompoundingMode) -> Self {
        self.compounding = compounding;
        self
    }

    /// Check every field. Called by `Simulator::new` before any candle is seen.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate::validate_strategy(self)
    }
}
