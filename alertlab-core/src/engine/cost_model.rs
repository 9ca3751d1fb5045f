//! Cost model: fee and slippage applied to every fill.
//!
//! Costs are directional: buyers pay more (higher price), sellers receive less
//! (lower price). Fee and slippage are both in basis points and combine
//! additively per side.
//!
//! Degenerate trigger prices (non-positive, NaN, infinite) yield a zero fill
//! price so downstream PnL arithmetic stays finite.

use crate::config::CostConfig;

const BPS: f64 = 10_000.0;

/// Buy-side fill price for a trigger price.
pub fn entry_fill_price(trigger_price: f64, costs: &CostConfig) -> f64 {
    adjust(
        trigger_price,
        1.0 + (costs.entry_fee_bps + costs.entry_slippage_bps) / BPS,
    )
}

/// Sell-side fill price for a trigger price, clamped to be non-negative.
pub fn exit_fill_price(trigger_price: f64, costs: &CostConfig) -> f64 {
    adjust(
        trigger_price,
        1.0 - (costs.exit_fee_bps + costs.exit_slippage_bps) / BPS,
    )
}

fn adjust(trigger_price: f64, factor: f64) -> f64 {
    if !trigger_price.is_finite() || trigger_price <= 0.0 || !factor.is_finite() {
        return 0.0;
    }
    (trigger_price * factor).max(0.0)
}

/// Cost model bound to one strategy's `CostConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CostModel {
    config: CostConfig,
}

impl CostModel {
    pub fn new(config: &CostConfig) -> Self {
        Self { config: *config }
    }

    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &CostConfig {
        &self.config
    }

    pub fn entry_fill_price(&self, trigger_price: f64) -> f64 {
        entry_fill_price(trigger_price, &self.config)
    }

    pub fn exit_fill_price(&self, trigger_price: f64) -> f64 {
        exit_fill_price(trigger_price, &self.config)
    }

    /// Fee component of a buy: `quantity * trigger_price * entry_fee_bps / 10_000`.
    pub fn entry_fee(&self, trigger_price: f64, quantity: f64) -> f64 {
        fee(trigger_price, quantity, self.config.entry_fee_bps)
    }

    /// Fee component of a sell.
    pub fn exit_fee(&self, trigger_price: f64, quantity: f64) -> f64 {
        fee(trigger_price, quantity, self.config.exit_fee_bps)
    }
}

fn fee(trigger_price: f64, quantity: f64, fee_bps: f64) -> f64 {
    if !trigger_price.is_finite() || trigger_price <= 0.0 {
        return 0.0;
    }
    trigger_price * quantity * (fee_bps / BPS)
}
