// 8.0: backtest engine. walks a price series tick by tick, driving the lp position,
// the hedge book, funding, capital sweeps and harvests against one ledger.
// deterministic with no external I/O.

mod capital;
mod config;
mod core;
mod funding;
mod hedging;
mod lp_phase;
mod results;

pub use config::EngineConfig;
pub use self::core::{run_backtest, run_backtest_with, Backtest};
pub use results::{EngineError, RunCounters, RunOutput};
