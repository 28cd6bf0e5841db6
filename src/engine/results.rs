// 8.0.2: result types and errors for a backtest run.

use crate::config::ConfigError;
use crate::events::Event;
use crate::ledger::{Ledger, SimulationState};
use crate::liquidity::{LiquidityError, LiquidityPosition};
use crate::position::HedgeBook;
use crate::types::Quote;
use serde::{Deserialize, Serialize};

/// How often each discrete thing happened. Counted even when the event log is capped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub ticks: usize,
    pub rebalances: usize,
    pub forced_rebalances: usize,
    pub hedge_adjustments: usize,
    pub safety_net_triggers: usize,
    pub margin_call_rejects: usize,
    pub order_failures: usize,
    pub rescues: usize,
    pub sweeps: usize,
    pub harvests: usize,
    pub funding_settlements: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub states: Vec<SimulationState>,
    pub events: Vec<Event>,
    pub ledger: Ledger,
    pub counters: RunCounters,
    pub final_lp: LiquidityPosition,
    pub final_hedge: HedgeBook,
    pub interval_minutes: u32,
}

impl RunOutput {
    pub fn final_state(&self) -> Option<&SimulationState> {
        self.states.last()
    }

    pub fn final_equity(&self) -> Quote {
        self.final_state().map(|s| s.net_equity).unwrap_or_else(Quote::zero)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Liquidity setup failed: {0}")]
    Liquidity(#[from] LiquidityError),

    #[error("Price series is empty")]
    EmptySeries,

    #[error("Timestamps must strictly increase (row {index})")]
    NonMonotonicTimestamps { index: usize },
}
