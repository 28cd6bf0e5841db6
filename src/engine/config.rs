//! Engine configuration options.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Run mechanics, separate from the strategy being tested.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Keep a row for every tick. When false only event ticks plus the first and last tick are kept.
    pub record_all_ticks: bool,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Ticks after a rebalance during which no new rebalance can start.
    pub rebalance_cooldown_ticks: u32,
    /// Consecutive over-threshold ticks needed before an in-range rebalance.
    pub drift_confirmation_ticks: u32,
    /// Ticks after a rebalance during which hedge adjustments are damped.
    pub hedge_grace_ticks: u32,
    /// Share of the hedge delta applied while the grace window is open.
    pub grace_damping: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            record_all_ticks: true,
            max_events: 100_000,
            rebalance_cooldown_ticks: 8,
            drift_confirmation_ticks: 4,
            hedge_grace_ticks: 2,
            grace_damping: dec!(0.5),
        }
    }
}

impl EngineConfig {
    /// Sparse recording for parameter sweeps.
    pub fn events_only() -> Self {
        Self {
            record_all_ticks: false,
            max_events: 10_000,
            ..Self::default()
        }
    }
}
