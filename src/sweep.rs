// 16.0: parameter sweeps. a grid of lp/strategy/market knobs expands to variants, price paths are
// generated once per (volatility, seed), and variants run in parallel on rayon.
// every variant owns its own lp, hedge book and ledger. results come back in grid order.

use crate::config::BacktestConfig;
use crate::engine::{run_backtest_with, EngineConfig, EngineError};
use crate::metrics::SummaryStats;
use crate::price_feed::{generate_gbm, GbmConfig, PriceFeedError, PricePoint};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("price generation failed: {0}")]
    PriceFeed(#[from] PriceFeedError),

    #[error("variant {index} failed: {source}")]
    Variant { index: usize, source: EngineError },

    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// One point of the grid. Everything not listed comes from the base config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepVariant {
    pub range_width: Decimal,
    pub rebalance_threshold: Decimal,
    pub hedge_threshold: Decimal,
    pub safety_net_pct: Decimal,
    pub annual_volatility: f64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub variant: SweepVariant,
    pub stats: SummaryStats,
}

#[derive(Debug, Clone)]
pub struct SweepGrid {
    pub base: BacktestConfig,
    pub market: GbmConfig,
    pub engine: EngineConfig,
    pub range_widths: Vec<Decimal>,
    pub rebalance_thresholds: Vec<Decimal>,
    pub hedge_thresholds: Vec<Decimal>,
    pub safety_net_pcts: Vec<Decimal>,
    pub volatilities: Vec<f64>,
    pub seeds: Vec<u64>,
    /// Dedicated pool size. None runs on the global rayon pool.
    pub threads: Option<usize>,
}

impl SweepGrid {
    // single-point grid around the base values
    pub fn around(base: BacktestConfig, market: GbmConfig) -> Self {
        Self {
            range_widths: vec![base.lp.range_width],
            rebalance_thresholds: vec![base.lp.rebalance_threshold],
            hedge_thresholds: vec![base.strategy.hedge_threshold],
            safety_net_pcts: vec![base.strategy.safety_net_pct],
            volatilities: vec![market.annual_volatility],
            seeds: vec![market.seed],
            base,
            market,
            engine: EngineConfig::default(),
            threads: None,
        }
    }

    /// Cartesian product, range width outermost and seed innermost.
    pub fn variants(&self) -> Vec<SweepVariant> {
        let mut out = Vec::new();
        for &range_width in &self.range_widths {
            for &rebalance_threshold in &self.rebalance_thresholds {
                for &hedge_threshold in &self.hedge_thresholds {
                    for &safety_net_pct in &self.safety_net_pcts {
                        for &annual_volatility in &self.volatilities {
                            for &seed in &self.seeds {
                                out.push(SweepVariant {
                                    range_width,
                                    rebalance_threshold,
                                    hedge_threshold,
                                    safety_net_pct,
                                    annual_volatility,
                                    seed,
                                });
                            }
                        }
                    }
                }
            }
        }
        out
    }

    pub fn config_for(&self, variant: &SweepVariant) -> BacktestConfig {
        let mut config = self.base.clone();
        config.lp.range_width = variant.range_width;
        config.lp.rebalance_threshold = variant.rebalance_threshold;
        config.strategy.hedge_threshold = variant.hedge_threshold;
        config.strategy.safety_net_pct = variant.safety_net_pct;
        config
    }

    // 16.1: paths first, sequentially, then the parallel map
    pub fn run(&self) -> Result<Vec<SweepOutcome>, SweepError> {
        let variants = self.variants();
        let paths = self.price_paths(&variants)?;
        info!(variants = variants.len(), paths = paths.len(), "sweep started");

        let outcomes = match self.threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
                pool.install(|| self.run_variants(&variants, &paths))
            }
            None => self.run_variants(&variants, &paths),
        }?;

        info!(
            survived = outcomes.iter().filter(|o| o.stats.survived()).count(),
            "sweep finished"
        );
        Ok(outcomes)
    }

    fn price_paths(&self, variants: &[SweepVariant]) -> Result<HashMap<(u64, u64), Vec<PricePoint>>, SweepError> {
        let mut paths = HashMap::new();
        for variant in variants {
            let key = path_key(variant);
            if paths.contains_key(&key) {
                continue;
            }
            let market = GbmConfig {
                annual_volatility: variant.annual_volatility,
                seed: variant.seed,
                ..self.market.clone()
            };
            paths.insert(key, generate_gbm(&market)?);
        }
        Ok(paths)
    }

    fn run_variants(
        &self,
        variants: &[SweepVariant],
        paths: &HashMap<(u64, u64), Vec<PricePoint>>,
    ) -> Result<Vec<SweepOutcome>, SweepError> {
        variants
            .par_iter()
            .enumerate()
            .map(|(index, variant)| {
                let series = paths.get(&path_key(variant)).map(Vec::as_slice).unwrap_or(&[]);
                let run = run_backtest_with(&self.config_for(variant), self.engine.clone(), series)
                    .map_err(|source| SweepError::Variant { index, source })?;
                Ok(SweepOutcome {
                    variant: *variant,
                    stats: SummaryStats::from_run(&run),
                })
            })
            .collect()
    }
}

fn path_key(variant: &SweepVariant) -> (u64, u64) {
    (variant.annual_volatility.to_bits(), variant.seed)
}

/// Fewest margin-call rejects first, then highest CAGR.
pub fn safest_first(outcomes: &mut [SweepOutcome]) {
    outcomes.sort_by(|a, b| {
        a.stats
            .counters
            .margin_call_rejects
            .cmp(&b.stats.counters.margin_call_rejects)
            .then_with(|| b.stats.cagr_pct.cmp(&a.stats.cagr_pct))
    });
}
