// hedged-lp-core: delta-neutral lp + perp hedge backtest engine.
// accounting-first architecture: every cash movement goes through the ledger under a closed category.
// all computation is deterministic with no external I/O inside the tick loop.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Side, Price, Quote, Leverage, Timestamp
//   2.x  liquidity.rs: concentrated liquidity position, sqrt-price value, fees, rebalancing
//   3.x  position.rs: hedge book, per-side positions, PnL, open/increase/reduce/close
//   3.5  margin.rs: notional, initial margin, fees, available margin
//   4.x  funding.rs: funding schedule, 8-hour payments, rate conversions
//   5.x  strategy.rs: ema + hysteresis signal, safety net, hedge order decision
//   6.x  ledger.rs: dual-venue bookkeeping, transaction categories, snapshots
//   7.x  config.rs: backtest config sections, toml loading, presets
//   8.x  engine/: the tick loop: lp phase, hedging + rescue, funding, sweeps, harvests
//   9.x  price_feed.rs: gbm generator, csv loader
//   11.x events.rs: structured run events and table tags
//   14.x report.rs: csv export/import of the run table and ledger totals
//   15.x metrics.rs: cagr, drawdown, sharpe, counts
//   16.x sweep.rs: parallel parameter grid
//   17.x risk.rs: var-style exchange margin sizing

// core simulation modules
pub mod engine;
pub mod events;
pub mod funding;
pub mod ledger;
pub mod liquidity;
pub mod margin;
pub mod position;
pub mod strategy;
pub mod types;

// integration modules
pub mod config;
pub mod metrics;
pub mod price_feed;
pub mod report;
pub mod risk;
pub mod sweep;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use ledger::*;
pub use liquidity::*;
pub use margin::*;
pub use position::*;
pub use strategy::*;
pub use types::*;
pub use config::{BacktestConfig, ConfigError, RescueBasisPolicy};
pub use metrics::SummaryStats;
pub use price_feed::{from_closes, generate_gbm, load_csv, GbmConfig, PriceFeedError, PricePoint};
pub use report::{read_ledger_totals, read_states, write_ledger_totals, write_states, ReportError};
pub use risk::{MarginEstimate, MarginRiskParams};
pub use sweep::{safest_first, SweepGrid, SweepOutcome};
