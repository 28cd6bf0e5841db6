// 8.3 engine/hedging.rs: turns the policy's order into a fill on the hedge book.
// margin shortfalls go through one emergency rescue from lp profit and one retry. a second failure
// is a reported margin-call reject. any other refusal from the hedge book is a failed order.
// nothing here ends the run.

use super::core::Backtest;
use crate::events::{
    EmergencyRescueEvent, EventPayload, HedgeAdjustedEvent, MarginCallRejectedEvent, OrderFailedEvent,
    SafetyNetEvent,
};
use crate::config::RescueBasisPolicy;
use crate::ledger::TransactionCategory;
use crate::margin::available_margin;
use crate::position::HedgeError;
use crate::strategy::{decide_hedge_order, HedgeOrder, IndicatorTick, OrderReason};
use crate::types::{Quote, Side};
use rust_decimal::Decimal;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct HedgeFill {
    fee: Quote,
    realized_pnl: Quote,
}

impl Backtest {
    pub(super) fn hedge_phase(&mut self, tick: &IndicatorTick) {
        let order = decide_hedge_order(tick, &self.lp, &self.hedge, &self.config.strategy);
        if let Some(order) = order {
            self.handle_order(order, tick);
        }

        if self.timers.hedge_grace > 0 {
            self.timers.hedge_grace -= 1;
        }

        // losses can push free margin negative without any new order
        let free = self.available_margin();
        if free.is_negative() && self.config.rescue.enabled {
            self.emergency_rescue(free.abs());
        }
    }

    pub(super) fn handle_order(&mut self, order: HedgeOrder, tick: &IndicatorTick) {
        let current = self.hedge.short_size();
        if order.reason == OrderReason::SafetyNet {
            self.counters.safety_net_triggers += 1;
            self.emit_event(EventPayload::SafetyNet(SafetyNetEvent {
                pct_change: tick.pct_change,
                target_size: order.target_size,
            }));
        }

        let mut target = order.target_size;
        if self.timers.hedge_grace > 0 {
            target = current + (target - current) * self.engine_config.grace_damping;
        }
        if (target - current).abs() <= self.config.strategy.min_order_size {
            return;
        }

        let fill = match self.move_hedge_to(target, current) {
            Ok(fill) => fill,
            Err(HedgeError::InsufficientMargin {
                required,
                available,
            }) => match self.rescue_and_retry(target, current, required, available) {
                Some(fill) => fill,
                None => return,
            },
            Err(other) => {
                self.fail_order(target, current, other);
                return;
            }
        };

        self.counters.hedge_adjustments += 1;
        let new_size = self.hedge.short_size();
        debug!(
            action = ?order.action,
            reason = %order.reason,
            old_size = %current,
            new_size = %new_size,
            fee = %fill.fee,
            "hedge adjusted"
        );
        self.emit_event(EventPayload::HedgeAdjusted(HedgeAdjustedEvent {
            action: order.action,
            reason: order.reason,
            old_size: current,
            new_size,
            price: tick.price,
            fee: fill.fee,
            realized_pnl: fill.realized_pnl,
        }));
    }

    // one rescue, one retry. None = rejected
    fn rescue_and_retry(
        &mut self,
        target: Decimal,
        current: Decimal,
        required: Quote,
        available: Quote,
    ) -> Option<HedgeFill> {
        let rescued = if self.config.rescue.enabled {
            self.emergency_rescue(required.sub(available).floor_zero())
        } else {
            Quote::zero()
        };
        if !rescued.is_positive() {
            self.reject_order(target, current, required, available);
            return None;
        }

        match self.move_hedge_to(target, current) {
            Ok(fill) => Some(fill),
            Err(HedgeError::InsufficientMargin {
                required,
                available,
            }) => {
                self.reject_order(target, current, required, available);
                None
            }
            Err(other) => {
                self.fail_order(target, current, other);
                None
            }
        }
    }

    // fee and realized pnl settle in the wallet
    fn move_hedge_to(&mut self, target: Decimal, current: Decimal) -> Result<HedgeFill, HedgeError> {
        if target > current {
            let fee = self
                .hedge
                .open_or_increase(Side::Short, target - current, self.ledger.wallet_balance())?;
            self.ledger
                .record_transaction(TransactionCategory::HedgeFee, fee.negate());
            Ok(HedgeFill {
                fee,
                realized_pnl: Quote::zero(),
            })
        } else {
            let closed = self.hedge.reduce_or_close(Side::Short, current - target)?;
            self.ledger
                .record_transaction(TransactionCategory::HedgeFee, closed.fee.negate());
            if !closed.realized_pnl.is_zero() {
                self.ledger
                    .record_transaction(TransactionCategory::RealizedPnl, closed.realized_pnl);
            }
            Ok(HedgeFill {
                fee: closed.fee,
                realized_pnl: closed.realized_pnl,
            })
        }
    }

    fn reject_order(&mut self, target: Decimal, current: Decimal, required: Quote, available: Quote) {
        self.counters.margin_call_rejects += 1;
        warn!(
            at = %self.current_time,
            requested = %(target - current),
            required = %required,
            available = %available,
            "margin call: hedge order rejected"
        );
        self.emit_event(EventPayload::MarginCallRejected(MarginCallRejectedEvent {
            requested_size: target - current,
            required,
            available,
        }));
    }

    fn fail_order(&mut self, target: Decimal, current: Decimal, error: HedgeError) {
        self.counters.order_failures += 1;
        warn!(
            at = %self.current_time,
            requested = %(target - current),
            error = %error,
            "hedge order failed"
        );
        self.emit_event(EventPayload::OrderFailed(OrderFailedEvent {
            requested_size: target - current,
            error: error.to_string(),
        }));
    }

    /// Moves min(deficit + buffer, capped share of accrued lp profit, lp value) into the wallet.
    /// Returns the amount moved.
    pub(super) fn emergency_rescue(&mut self, deficit: Quote) -> Quote {
        let rescue = &self.config.rescue;
        let wanted = deficit.mul(Decimal::ONE + rescue.buffer_fraction);
        let profit_before = self.lp.accumulated_profit();
        let cap = profit_before.mul(rescue.max_profit_fraction);
        let amount = wanted.min(cap).min(self.lp.value()).floor_zero();
        if amount.is_zero() {
            return Quote::zero();
        }

        let reduce_basis = rescue.basis_policy == RescueBasisPolicy::ReduceCostBasis;
        let moved = self.lp.withdraw_profit(amount, reduce_basis);
        if moved.is_zero() {
            return moved;
        }
        self.ledger
            .record_transaction(TransactionCategory::RescueWithdrawal, moved.negate());
        self.ledger
            .record_transaction(TransactionCategory::Deposit, moved);
        self.counters.rescues += 1;

        warn!(deficit = %deficit, moved = %moved, lp_value = %self.lp.value(), "emergency rescue");
        self.emit_event(EventPayload::EmergencyRescue(EmergencyRescueEvent {
            deficit,
            accumulated_profit_before: profit_before,
            transferred: moved,
            lp_value_after: self.lp.value(),
        }));
        moved
    }

    pub(super) fn available_margin(&self) -> Quote {
        available_margin(
            self.ledger.wallet_balance(),
            self.hedge.total_unrealized_pnl(),
            self.hedge.total_margin_used(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BacktestConfig;
    use crate::engine::EngineConfig;
    use crate::events::EventTag;
    use crate::strategy::{HedgeAction, Signal};
    use crate::types::{Price, Timestamp};
    use rust_decimal_macros::dec;

    fn backtest(config: BacktestConfig) -> Backtest {
        Backtest::new(config, EngineConfig::default(), Price::new_unchecked(dec!(2000))).unwrap()
    }

    fn tick() -> IndicatorTick {
        IndicatorTick {
            timestamp: Timestamp::from_millis(0),
            price: Price::new_unchecked(dec!(2000)),
            ema: dec!(2000),
            upper_band: dec!(2010),
            lower_band: dec!(1990),
            pct_change: Decimal::ZERO,
            signal: Signal::HedgeOn,
        }
    }

    #[test]
    fn refused_order_is_reported_not_raised() {
        let mut backtest = backtest(BacktestConfig::default());
        // lets a zero-size order past the dust check, the book refuses it
        backtest.config.strategy.min_order_size = dec!(-1);
        let order = HedgeOrder {
            action: HedgeAction::FlipOn,
            target_size: Decimal::ZERO,
            delta: Decimal::ZERO,
            reason: OrderReason::SignalFlip,
        };

        backtest.handle_order(order, &tick());

        assert_eq!(backtest.counters.order_failures, 1);
        assert_eq!(backtest.counters.hedge_adjustments, 0);
        assert_eq!(backtest.tick_tags, vec![EventTag::OrderFailed]);
        match &backtest.events[0].payload {
            EventPayload::OrderFailed(failed) => {
                assert_eq!(failed.requested_size, Decimal::ZERO);
                assert_eq!(failed.error, HedgeError::InvalidSize(Decimal::ZERO).to_string());
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(backtest.hedge.is_flat());
    }

    #[test]
    fn rescue_is_capped_by_profit_share() {
        let mut config = BacktestConfig::default();
        config.rescue.max_profit_fraction = dec!(0.5);
        let mut backtest = backtest(config);
        for _ in 0..24 {
            backtest.accrue_lp_fees();
        }
        let profit = backtest.lp.accumulated_profit();
        assert!(profit.is_positive());

        // a deficit far above the profit: only half the profit moves
        let moved = backtest.emergency_rescue(Quote::new(dec!(1000000)));
        assert_eq!(moved, profit.mul(dec!(0.5)));
        assert_eq!(backtest.lp.accumulated_profit(), profit.sub(moved));
        assert_eq!(backtest.ledger.total(TransactionCategory::Deposit), moved);
    }

    #[test]
    fn rescue_without_profit_moves_nothing() {
        let mut backtest = backtest(BacktestConfig::default());
        assert_eq!(backtest.emergency_rescue(Quote::new(dec!(500))), Quote::zero());
        assert_eq!(backtest.counters.rescues, 0);
        assert!(backtest.events.is_empty());
    }
}
