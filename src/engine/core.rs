// 8.0 engine/core.rs: the backtest. owns the lp, the hedge book, the ledger and the event log.
// one run = one pass over a pre-built price series, phases strictly in order on every tick:
// mark -> fee -> rebalance -> hedge -> funding -> sweep -> harvest -> snapshot

use super::config::EngineConfig;
use super::results::{EngineError, RunCounters, RunOutput};
use crate::config::BacktestConfig;
use crate::events::{Event, EventId, EventPayload, EventTag};
use crate::funding::FundingSchedule;
use crate::ledger::{Ledger, SimulationState, Venue};
use crate::liquidity::LiquidityPosition;
use crate::position::HedgeBook;
use crate::price_feed::PricePoint;
use crate::strategy::{populate_indicators, IndicatorTick};
use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use tracing::{debug, info, trace};

// countdowns and streaks carried between ticks
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct PhaseTimers {
    pub rebalance_cooldown: u32,
    pub drift_streak: u32,
    pub hedge_grace: u32,
}

/** 8.1: backtest struct. all run state lives here */
#[derive(Debug)]
pub struct Backtest {
    pub(super) config: BacktestConfig,
    pub(super) engine_config: EngineConfig,
    pub(super) schedule: FundingSchedule,
    pub(super) sweep_target_ratio: Decimal,
    pub(super) lp: LiquidityPosition,
    pub(super) hedge: HedgeBook,
    pub(super) ledger: Ledger,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
    pub(super) tick_tags: Vec<EventTag>,
    pub(super) timers: PhaseTimers,
    pub(super) counters: RunCounters,
}

impl Backtest {
    // setup errors surface here, before any tick runs
    pub fn new(
        config: BacktestConfig,
        engine_config: EngineConfig,
        start_price: Price,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mut ledger = Ledger::new(config.initial_capital());
        let lp_capital = ledger.allocate(config.capital.lp_capital, Venue::Lp);
        ledger.allocate(config.capital.exchange_capital, Venue::Exchange);

        let lp = LiquidityPosition::initialize(lp_capital, start_price, config.lp.clone())?;
        let mut hedge = HedgeBook::new(config.hedge.clone());
        hedge.update_market_price(start_price);

        Ok(Self {
            schedule: config.schedule(),
            sweep_target_ratio: config.sweep_target_ratio(),
            config,
            engine_config,
            lp,
            hedge,
            ledger,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
            tick_tags: Vec::new(),
            timers: PhaseTimers::default(),
            counters: RunCounters::default(),
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn schedule(&self) -> FundingSchedule {
        self.schedule
    }

    pub fn lp(&self) -> &LiquidityPosition {
        &self.lp
    }

    pub fn hedge(&self) -> &HedgeBook {
        &self.hedge
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    // 8.2: the whole series, sequentially. the run always completes once setup passed.
    pub fn run(mut self, series: &[PricePoint]) -> Result<RunOutput, EngineError> {
        validate_series(series)?;
        let ticks = populate_indicators(series, &self.config.strategy);
        let last = ticks.len() - 1;

        info!(
            ticks = ticks.len(),
            interval_minutes = self.schedule.interval_minutes,
            lp_capital = %self.config.capital.lp_capital,
            exchange_capital = %self.config.capital.exchange_capital,
            "backtest started"
        );

        let mut states = Vec::with_capacity(if self.engine_config.record_all_ticks { ticks.len() } else { 64 });
        for (index, tick) in ticks.iter().enumerate() {
            let state = self.step(index, tick);
            if self.engine_config.record_all_ticks || !state.tags.is_empty() || index == 0 || index == last {
                states.push(state);
            }
        }

        info!(
            rows = states.len(),
            rebalances = self.counters.rebalances,
            hedge_adjustments = self.counters.hedge_adjustments,
            margin_call_rejects = self.counters.margin_call_rejects,
            rescues = self.counters.rescues,
            final_equity = %states.last().map(|s| s.net_equity.value()).unwrap_or_default(),
            "backtest finished"
        );

        Ok(RunOutput {
            states,
            events: self.events,
            ledger: self.ledger,
            counters: self.counters,
            final_lp: self.lp,
            final_hedge: self.hedge,
            interval_minutes: self.schedule.interval_minutes,
        })
    }

    /// Runs every phase for one tick and returns the row it produced.
    pub fn step(&mut self, index: usize, tick: &IndicatorTick) -> SimulationState {
        self.current_time = tick.timestamp;
        self.tick_tags.clear();
        self.counters.ticks += 1;

        self.mark_to_market(tick.price);
        self.accrue_lp_fees();
        self.rebalance_phase(tick.price);
        self.hedge_phase(tick);
        self.funding_phase(index);
        self.sweep_phase(index);
        self.harvest_phase(index);

        self.snapshot(tick)
    }

    fn snapshot(&mut self, tick: &IndicatorTick) -> SimulationState {
        self.ledger
            .snapshot(
                tick.timestamp,
                tick.price,
                self.lp.value(),
                self.hedge.total_unrealized_pnl(),
                self.hedge.total_margin_used(),
            )
            .with_inventory(self.lp.volatile_inventory(), self.hedge.short_size())
            .with_tags(std::mem::take(&mut self.tick_tags))
    }

    // every `days` on the tick clock, never on tick 0
    pub(super) fn is_cadence_tick(&self, index: usize, days: u32) -> bool {
        index > 0 && index % self.schedule.ticks_per_days(days) == 0
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let tag = payload.tag();
        if !self.tick_tags.contains(&tag) {
            self.tick_tags.push(tag);
        }

        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;
        trace!(id = event.id.0, tag = %tag, at = %event.timestamp, "event");

        self.events.push(event);
        if self.events.len() > self.engine_config.max_events {
            let drain_count = self.events.len() - self.engine_config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

fn validate_series(series: &[PricePoint]) -> Result<(), EngineError> {
    if series.is_empty() {
        return Err(EngineError::EmptySeries);
    }
    if let Some(index) = series
        .windows(2)
        .position(|pair| pair[1].timestamp <= pair[0].timestamp)
    {
        return Err(EngineError::NonMonotonicTimestamps { index: index + 1 });
    }
    debug!(first = %series[0].timestamp, last = %series[series.len() - 1].timestamp, "series accepted");
    Ok(())
}

/// One run with default engine settings, starting the lp at the first close.
pub fn run_backtest(config: &BacktestConfig, series: &[PricePoint]) -> Result<RunOutput, EngineError> {
    run_backtest_with(config, EngineConfig::default(), series)
}

pub fn run_backtest_with(
    config: &BacktestConfig,
    engine_config: EngineConfig,
    series: &[PricePoint],
) -> Result<RunOutput, EngineError> {
    let first = series.first().ok_or(EngineError::EmptySeries)?;
    Backtest::new(config.clone(), engine_config, first.price)?.run(series)
}
