//! Scenario tests with hand-built price paths.

use hedged_lp_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn start() -> Timestamp {
    Timestamp::from_millis(1_704_067_200_000)
}

fn hourly(closes: &[Decimal]) -> Vec<PricePoint> {
    from_closes(start(), 60, closes)
}

fn flat(price: Decimal, ticks: usize) -> Vec<PricePoint> {
    hourly(&vec![price; ticks])
}

mod fee_accrual {
    use super::*;

    #[test]
    fn flat_price_accrues_annualized_fee() {
        let config = BacktestConfig::default();
        let run = run_backtest(&config, &flat(dec!(2000), 100)).unwrap();

        let multiplier = capital_efficiency_multiplier(dec!(0.10));
        let expected = dec!(10000) * dec!(0.05) * multiplier * dec!(100) / dec!(8760);
        let fees = run.final_state().unwrap().cumulative_fees.value();

        assert!((fees - expected).abs() / expected < dec!(0.01), "fees {} vs {}", fees, expected);
        assert_eq!(run.counters.rebalances, 0);
        assert_eq!(run.ledger.total(TransactionCategory::Gas), Quote::zero());
    }

    #[test]
    fn no_fee_out_of_range() {
        let mut position = LiquidityPosition::initialize(
            Quote::new(dec!(10000)),
            Price::new_unchecked(dec!(2000)),
            LpParams::default(),
        )
        .unwrap();
        position.update_price(Price::new_unchecked(dec!(2500)));
        assert_eq!(position.accrue_fee(dec!(8760)), Quote::zero());
        assert_eq!(position.accumulated_profit(), Quote::zero());
    }
}

mod boundary_cross {
    use super::*;

    #[test]
    fn skew_snaps_and_rebalance_recenters() {
        let mut position = LiquidityPosition::initialize(
            Quote::new(dec!(10000)),
            Price::new_unchecked(dec!(2000)),
            LpParams::default(),
        )
        .unwrap();

        position.update_price(Price::new_unchecked(dec!(1700)));
        assert_eq!(position.skew(), Decimal::ONE);
        assert!(!position.is_in_range());

        assert!(position.check_and_rebalance().is_rebalanced());
        assert_eq!(position.price_lower().value(), dec!(1530));
        assert_eq!(position.price_upper().value(), dec!(1870));
        assert_eq!(position.skew(), dec!(0.5));
        assert_eq!(position.rebalance_count(), 1);
    }

    #[test]
    fn engine_rebalances_on_the_crossing_tick() {
        let mut closes = vec![dec!(2000)];
        closes.extend(vec![dec!(1700); 20]);
        let run = run_backtest(&BacktestConfig::default(), &hourly(&closes)).unwrap();

        assert!(run.states[1].has_tag(EventTag::LpRebalance));
        assert_eq!(run.counters.rebalances, 1);
        assert_eq!(run.counters.forced_rebalances, 1);
        assert_eq!(run.final_lp.price_lower().value(), dec!(1530));
        assert!(run.ledger.total(TransactionCategory::Gas).is_negative());
        assert!(run.ledger.total(TransactionCategory::Slippage).is_negative());
    }

    #[test]
    fn in_range_drift_waits_for_confirmation() {
        // +8% stays inside ±10% but skews past the 0.2 threshold
        let mut closes = vec![dec!(2000)];
        closes.extend(vec![dec!(2160); 10]);
        let run = run_backtest(&BacktestConfig::default(), &hourly(&closes)).unwrap();

        let first = run.states.iter().position(|s| s.has_tag(EventTag::LpRebalance));
        // streak counts ticks 1..=4
        assert_eq!(first, Some(4));
        assert_eq!(run.counters.forced_rebalances, 0);
    }
}

mod margin {
    use super::*;

    #[test]
    fn oversized_open_is_rejected() {
        let mut book = HedgeBook::new(HedgeParams::default());
        book.update_market_price(Price::new_unchecked(dec!(2000)));

        let err = book.open_or_increase(Side::Short, dec!(1), Quote::new(dec!(100))).unwrap_err();
        assert_eq!(
            err,
            HedgeError::InsufficientMargin {
                required: Quote::new(dec!(2001)),
                available: Quote::new(dec!(100)),
            }
        );
        assert_eq!(book.short_size(), Decimal::ZERO);
        assert!(book.is_flat());
    }

    #[test]
    fn half_close_realizes_half() {
        let mut book = HedgeBook::new(HedgeParams::default());
        book.update_market_price(Price::new_unchecked(dec!(2000)));
        book.open_or_increase(Side::Short, dec!(2), Quote::new(dec!(10000))).unwrap();
        book.update_market_price(Price::new_unchecked(dec!(1900)));
        assert_eq!(book.total_unrealized_pnl().value(), dec!(200));

        let closed = book.reduce_or_close(Side::Short, dec!(1)).unwrap();
        assert_eq!(closed.realized_pnl.value(), dec!(100));
        assert_eq!(closed.fee.value(), dec!(0.95));
        assert_eq!(book.total_margin_used().value(), dec!(2000));
        assert_eq!(book.total_unrealized_pnl().value(), dec!(100));
    }

    #[test]
    fn empty_exchange_wallet_rescues_then_rejects() {
        let mut config = BacktestConfig::default();
        config.capital.exchange_capital = Quote::zero();
        let run = run_backtest(&config, &flat(dec!(2000), 10)).unwrap();

        let first = &run.states[0];
        assert_eq!(first.tags, vec![EventTag::EmergencyRescue, EventTag::MarginCallReject]);
        assert_eq!(first.hedge_size, Decimal::ZERO);
        assert!(first.wallet_balance.is_positive());
        assert!(run.counters.margin_call_rejects >= 1);
        assert!(run.final_hedge.is_flat());
    }

    #[test]
    fn rescue_disabled_rejects_without_moving_cash() {
        let mut config = BacktestConfig::default();
        config.capital.exchange_capital = Quote::zero();
        config.rescue.enabled = false;
        let run = run_backtest(&config, &flat(dec!(2000), 5)).unwrap();

        assert_eq!(run.counters.rescues, 0);
        assert_eq!(run.counters.margin_call_rejects, 5);
        assert_eq!(run.ledger.wallet_balance(), Quote::zero());
    }

    #[test]
    fn rescue_basis_policy_controls_cost_basis() {
        let mut config = BacktestConfig::default();
        config.capital.exchange_capital = Quote::zero();
        let series = flat(dec!(2000), 10);

        let market_only = run_backtest(&config, &series).unwrap();
        assert!(market_only.counters.rescues > 0);
        assert_eq!(market_only.final_lp.cost_basis().value(), dec!(10000));

        config.rescue.basis_policy = RescueBasisPolicy::ReduceCostBasis;
        let reduced = run_backtest(&config, &series).unwrap();
        let rescued = reduced.ledger.total(TransactionCategory::Deposit);
        assert!(rescued.is_positive());
        assert_eq!(reduced.final_lp.cost_basis(), Quote::new(dec!(10000)).sub(rescued));
    }
}

mod funding {
    use super::*;

    #[test]
    fn long_ticks_pay_every_period_they_span() {
        let mut config = BacktestConfig::default();
        config.strategy.hedge_mode = HedgeMode::Always;
        config.execution.interval_minutes = 720;
        let series = from_closes(start(), 720, &[dec!(2000); 4]);

        let run = run_backtest(&config, &series).unwrap();
        assert_eq!(run.counters.funding_settlements, 3);
        for event in &run.events {
            if let EventPayload::FundingSettled(funding) = &event.payload {
                // 0.01% per 8h over a 12h tick
                assert_eq!(funding.funding_rate, dec!(0.00015));
                assert_eq!(funding.payment.value(), funding.hedge_size * dec!(2000) * dec!(0.00015));
            }
        }
    }
}

mod signals {
    use super::*;

    #[test]
    fn safety_net_overrides_uptrend() {
        let run = run_backtest(
            &BacktestConfig::default(),
            &hourly(&[dec!(2000), dec!(2020), dec!(2080)]),
        )
        .unwrap();

        // hedge on by default, off once price clears the band, back on after a 2.97% jump
        assert!(run.states[0].hedge_size > Decimal::ZERO);
        assert_eq!(run.states[1].hedge_size, Decimal::ZERO);
        assert!(run.states[2].has_tag(EventTag::SafetyNet));
        assert!(run.states[2].has_tag(EventTag::AdjustHedge));
        assert!(run.states[2].hedge_size > Decimal::ZERO);
        assert_eq!(run.counters.safety_net_triggers, 1);
    }

    #[test]
    fn always_mode_ignores_trend() {
        let mut config = BacktestConfig::default();
        config.strategy.hedge_mode = HedgeMode::Always;
        let run = run_backtest(&config, &hourly(&[dec!(2000), dec!(2020), dec!(2030)])).unwrap();
        assert!(run.states.iter().all(|s| s.hedge_size > Decimal::ZERO));
    }
}

mod capital_moves {
    use super::*;

    #[test]
    fn harvest_takes_exact_target() {
        let mut config = BacktestConfig::default();
        config.capital.exchange_capital = Quote::new(dec!(20000));
        config.harvesting.enabled = true;
        config.harvesting.frequency_days = 30;
        config.harvesting.withdrawal_target = Quote::new(dec!(100));

        let run = run_backtest(&config, &flat(dec!(2000), 24 * 31)).unwrap();
        assert_eq!(run.counters.harvests, 1);
        assert!(run.states[720].has_tag(EventTag::Harvest));
        assert_eq!(run.ledger.total_withdrawn().value(), dec!(100));
        assert_eq!(run.final_state().unwrap().total_withdrawn.value(), dec!(100));
        assert_eq!(run.ledger.total(TransactionCategory::Withdrawal).value(), dec!(-100));
    }

    #[test]
    fn harvest_skips_without_surplus() {
        let mut config = BacktestConfig::default();
        config.harvesting.enabled = true;
        config.harvesting.frequency_days = 1;
        config.harvesting.withdrawal_target = Quote::new(dec!(1000));

        let run = run_backtest(&config, &flat(dec!(2000), 24 * 3)).unwrap();
        assert_eq!(run.counters.harvests, 0);
        assert_eq!(run.ledger.total_withdrawn(), Quote::zero());
    }

    #[test]
    fn sweep_moves_lp_surplus_to_exchange() {
        let mut config = BacktestConfig::default();
        config.cross_margin.enabled = true;
        config.cross_margin.frequency_days = 7;
        config.cross_margin.target_ratio = Some(dec!(0.5));

        let run = run_backtest(&config, &flat(dec!(2000), 24 * 8)).unwrap();
        assert!(run.states[168].has_tag(EventTag::CrossSweep));
        assert!(run.ledger.total(TransactionCategory::SweepToExchange).is_positive());

        let sweep = run
            .events
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::CrossSweep(sweep) => Some(sweep.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(sweep.direction, SweepDirection::LpToExchange);
        assert!(sweep.lp_ratio_before > dec!(0.5));
    }

    #[test]
    fn sweep_to_lp_never_exceeds_free_margin() {
        let mut config = BacktestConfig::default();
        config.cross_margin.enabled = true;
        config.cross_margin.frequency_days = 7;
        config.cross_margin.target_ratio = Some(dec!(0.9));

        let run = run_backtest(&config, &flat(dec!(2000), 24 * 8)).unwrap();
        let state = &run.states[168];
        assert!(state.has_tag(EventTag::CrossSweep));
        assert!(!state.available_margin.is_negative());
        assert!(run.ledger.total(TransactionCategory::SweepToLp).is_negative());
    }
}

mod report_round_trip {
    use super::*;

    #[test]
    fn table_and_totals_survive_csv() {
        let series = generate_gbm(&GbmConfig {
            days: 5,
            seed: 9,
            ..GbmConfig::default()
        })
        .unwrap();
        let run = run_backtest(&BacktestConfig::default(), &series).unwrap();

        let mut table = Vec::new();
        write_states(&mut table, &run.states).unwrap();
        assert_eq!(read_states(table.as_slice()).unwrap(), run.states);

        let mut totals = Vec::new();
        write_ledger_totals(&mut totals, run.ledger.totals()).unwrap();
        assert_eq!(&read_ledger_totals(totals.as_slice()).unwrap(), run.ledger.totals());
    }
}

mod setup_errors {
    use super::*;

    #[test]
    fn invalid_config_fails_before_any_tick() {
        let mut config = BacktestConfig::default();
        config.capital.lp_capital = Quote::zero();
        let err = run_backtest(&config, &flat(dec!(2000), 5)).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::InvalidCapital { .. })));
    }

    #[test]
    fn negative_dust_floor_is_a_config_error() {
        let mut config = BacktestConfig::default();
        config.strategy.min_order_size = dec!(-1);
        let series = hourly(&[dec!(2000), dec!(2100), dec!(2110), dec!(2120)]);
        let err = run_backtest(&config, &series).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::InvalidStrategy { .. })));
    }

    #[test]
    fn empty_and_unordered_series() {
        let config = BacktestConfig::default();
        assert!(matches!(run_backtest(&config, &[]), Err(EngineError::EmptySeries)));

        let mut series = flat(dec!(2000), 3);
        series.swap(1, 2);
        assert!(matches!(
            run_backtest(&config, &series),
            Err(EngineError::NonMonotonicTimestamps { index: 2 })
        ));
    }
}
