//! Hedged LP backtest demo.
//!
//! Runs a handful of scenarios over synthetic gbm paths: the default strategy, always-on hedging,
//! an underfunded exchange wallet, harvesting with cross-margin sweeps, margin sizing and a small
//! parameter sweep.
//!
//! Usage: `hedged-lp-sim [config.toml] [table.csv]`. With a config file the first scenario uses it,
//! and with a second path its per-tick table is written there. Set `RUST_LOG=debug` for fills.

use hedged_lp_core::*;
use rust_decimal_macros::dec;
use std::error::Error;
use std::fs::File;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.first() {
        Some(path) => BacktestConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => BacktestConfig::default(),
    };

    println!("Hedged LP Backtest Engine");
    println!("Concentrated liquidity + short perp hedge, 1h ticks\n");

    let run = scenario_1_default_strategy(&config)?;
    if let Some(path) = args.get(1) {
        write_states(File::create(path)?, &run.states)?;
        println!("  Table written to {path}\n");
    }
    scenario_2_always_hedged()?;
    scenario_3_underfunded_exchange()?;
    scenario_4_harvest_and_sweeps()?;
    scenario_5_margin_sizing();
    scenario_6_parameter_sweep()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn market(days: u32, seed: u64) -> GbmConfig {
    GbmConfig {
        days,
        seed,
        ..GbmConfig::default()
    }
}

fn print_summary(stats: &SummaryStats) {
    println!("  Final equity:      ${:.2}", stats.final_equity.value());
    println!("  Withdrawn:         ${:.2}", stats.total_withdrawn.value());
    println!("  Net profit:        ${:.2}", stats.net_profit.value());
    println!("  CAGR:              {:.2}%", stats.cagr_pct);
    println!("  Max drawdown:      {:.2}%", stats.max_drawdown_pct);
    println!("  Sharpe:            {:.2}", stats.sharpe);
    println!("  Min free margin:   ${:.2}", stats.min_available_margin.value());
    println!(
        "  Rebalances {} | hedge trades {} | margin calls {} | rescues {} | sweeps {} | harvests {}",
        stats.counters.rebalances,
        stats.counters.hedge_adjustments,
        stats.counters.margin_call_rejects,
        stats.counters.rescues,
        stats.counters.sweeps,
        stats.counters.harvests,
    );
}

/// Trend-following hedge on a 30 day path.
fn scenario_1_default_strategy(config: &BacktestConfig) -> Result<RunOutput, Box<dyn Error>> {
    println!("Scenario 1: Default Strategy, 30 Days\n");

    let series = generate_gbm(&market(30, 42))?;
    let run = run_backtest(config, &series)?;
    print_summary(&SummaryStats::from_run(&run));

    println!("\n  Ledger breakdown:");
    for (category, amount) in run.ledger.totals() {
        if !amount.is_zero() {
            println!("    {:<24} {:>12.4}", category.as_str(), amount.value());
        }
    }
    println!();
    Ok(run)
}

/// Same path, hedge never switched off.
fn scenario_2_always_hedged() -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Always Hedged vs Trend\n");

    let series = generate_gbm(&market(30, 42))?;
    let trend = SummaryStats::from_run(&run_backtest(&BacktestConfig::default(), &series)?);

    let mut always = BacktestConfig::default();
    always.strategy.hedge_mode = HedgeMode::Always;
    let always = SummaryStats::from_run(&run_backtest(&always, &series)?);

    println!("  Trend:  equity ${:.2}, {} hedge trades", trend.final_equity.value(), trend.counters.hedge_adjustments);
    println!("  Always: equity ${:.2}, {} hedge trades\n", always.final_equity.value(), always.counters.hedge_adjustments);
    Ok(())
}

/// No cash on the exchange. Every hedge needs a rescue out of lp profit first.
fn scenario_3_underfunded_exchange() -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Underfunded Exchange Wallet\n");

    let mut config = BacktestConfig::default();
    config.capital.exchange_capital = Quote::zero();
    config.strategy.hedge_mode = HedgeMode::Always;

    let series = generate_gbm(&market(14, 7))?;
    let run = run_backtest_with(&config, EngineConfig::events_only(), &series)?;

    let first_reject = run.states.iter().find(|s| s.has_tag(EventTag::MarginCallReject));
    if let Some(state) = first_reject {
        println!("  First margin call at {} (tags: {})", state.timestamp, report::join_tags(&state.tags));
    }
    print_summary(&SummaryStats::from_run(&run));
    println!();
    Ok(())
}

/// Aggressive preset over 90 days: 3x leverage, harvesting and weekly sweeps.
fn scenario_4_harvest_and_sweeps() -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Harvesting + Cross-Margin Sweeps, 90 Days\n");

    let mut config = BacktestConfig::aggressive();
    config.cross_margin.enabled = true;
    config.harvesting.withdrawal_target = Quote::new(dec!(50));

    let series = generate_gbm(&market(90, 11))?;
    let run = run_backtest(&config, &series)?;
    print_summary(&SummaryStats::from_run(&run));

    for event in run.events.iter().filter(|e| e.tag() == EventTag::CrossSweep).take(3) {
        if let EventPayload::CrossSweep(sweep) = &event.payload {
            println!("  {} sweep {:?} ${:.2}", event.timestamp, sweep.direction, sweep.amount.value());
        }
    }
    println!();
    Ok(())
}

fn scenario_5_margin_sizing() {
    println!("Scenario 5: Exchange Margin Sizing (weekly sweep horizon)\n");

    let params = MarginRiskParams {
        lp_capital: Quote::new(dec!(10000)),
        leverage: Leverage::new(dec!(3)).unwrap_or(Leverage::one()),
        annual_volatility: dec!(0.8),
        horizon_days: dec!(7),
    };
    println!("  Base margin: ${:.2}", params.base_margin().value());
    for estimate in params.estimates(&risk::DEFAULT_CONFIDENCE_LEVELS) {
        println!(
            "  {:.1}% (z={:.2}): up to +{:.1}%, hedge loss ${:.2}, keep ${:.2} on the exchange",
            estimate.confidence * dec!(100),
            estimate.z_score,
            estimate.max_up_move * dec!(100),
            estimate.expected_hedge_loss.value(),
            estimate.recommended_exchange_capital.value(),
        );
    }
    println!();
}

fn scenario_6_parameter_sweep() -> Result<(), Box<dyn Error>> {
    println!("Scenario 6: Parameter Sweep\n");

    let mut grid = SweepGrid::around(BacktestConfig::default(), market(30, 42));
    grid.range_widths = vec![dec!(0.05), dec!(0.10), dec!(0.20)];
    grid.hedge_thresholds = vec![dec!(0.05), dec!(0.10)];
    grid.seeds = vec![1, 2, 3];
    grid.engine = EngineConfig::events_only();

    let mut outcomes = grid.run()?;
    safest_first(&mut outcomes);
    println!("  {} variants, top 3:", outcomes.len());
    for outcome in outcomes.iter().take(3) {
        println!(
            "  range {} hedge {} seed {}: CAGR {:.2}%, DD {:.2}%, margin calls {}",
            outcome.variant.range_width,
            outcome.variant.hedge_threshold,
            outcome.variant.seed,
            outcome.stats.cagr_pct,
            outcome.stats.max_drawdown_pct,
            outcome.stats.counters.margin_call_rejects,
        );
    }
    Ok(())
}
