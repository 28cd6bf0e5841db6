//! Mark-to-market, fee accrual and the LP rebalance trigger.

use super::core::Backtest;
use crate::events::{EventPayload, LpRebalancedEvent};
use crate::ledger::TransactionCategory;
use crate::liquidity::RebalanceOutcome;
use crate::types::Price;
use tracing::debug;

impl Backtest {
    pub(super) fn mark_to_market(&mut self, price: Price) {
        self.lp.update_price(price);
        self.hedge.update_market_price(price);
    }

    pub(super) fn accrue_lp_fees(&mut self) {
        let fee = self.lp.accrue_fee(self.schedule.ticks_per_year);
        if fee.is_positive() {
            self.ledger.record_transaction(TransactionCategory::LpFee, fee);
        }
    }

    /// Drift has to persist for a few ticks before an in-range rebalance fires.
    /// Leaving the range skips the wait. Both respect the post-rebalance cooldown.
    pub(super) fn rebalance_phase(&mut self, price: Price) {
        if self.timers.rebalance_cooldown > 0 {
            self.timers.rebalance_cooldown -= 1;
        }

        let skewed = self.lp.drift() > self.lp.params().rebalance_threshold;
        if !skewed || self.timers.rebalance_cooldown > 0 {
            self.timers.drift_streak = 0;
            return;
        }

        self.timers.drift_streak += 1;
        let out_of_range = !self.lp.is_in_range();
        if !out_of_range && self.timers.drift_streak < self.engine_config.drift_confirmation_ticks {
            return;
        }

        let RebalanceOutcome::Rebalanced {
            gas_cost,
            slippage_cost,
        } = self.lp.check_and_rebalance()
        else {
            return;
        };

        self.ledger
            .record_transaction(TransactionCategory::Slippage, slippage_cost.negate());
        self.ledger
            .record_transaction(TransactionCategory::Gas, gas_cost.negate());

        self.timers.rebalance_cooldown = self.engine_config.rebalance_cooldown_ticks;
        self.timers.drift_streak = 0;
        self.timers.hedge_grace = self.engine_config.hedge_grace_ticks;
        self.counters.rebalances += 1;
        if out_of_range {
            self.counters.forced_rebalances += 1;
        }

        debug!(
            price = %price,
            lower = %self.lp.price_lower(),
            upper = %self.lp.price_upper(),
            gas = %gas_cost,
            slippage = %slippage_cost,
            forced = out_of_range,
            "lp rebalanced"
        );
        self.emit_event(EventPayload::LpRebalanced(LpRebalancedEvent {
            price,
            new_lower: self.lp.price_lower(),
            new_upper: self.lp.price_upper(),
            gas_cost,
            slippage_cost,
            forced: out_of_range,
        }));
    }
}
