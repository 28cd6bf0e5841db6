//! Funding rate settlement.

use super::core::Backtest;
use crate::events::{EventPayload, FundingSettledEvent};
use crate::ledger::TransactionCategory;
use tracing::debug;

impl Backtest {
    /// Applies the configured per-8h rate to every open hedge on funding ticks.
    pub(super) fn funding_phase(&mut self, index: usize) {
        if !self.schedule.is_funding_tick(index) || self.hedge.is_flat() {
            return;
        }

        let rate = self.schedule.settlement_rate(self.config.execution.funding_rate_per_8h);
        let payment = self.hedge.apply_funding(rate);
        if payment.is_zero() {
            return;
        }

        let category = if payment.is_positive() {
            TransactionCategory::FundingRevenue
        } else {
            TransactionCategory::FundingExpense
        };
        self.ledger.record_transaction(category, payment);
        self.counters.funding_settlements += 1;

        debug!(rate = %rate, payment = %payment, "funding settled");
        self.emit_event(EventPayload::FundingSettled(FundingSettledEvent {
            funding_rate: rate,
            payment,
            hedge_size: self.hedge.short_size(),
        }));
    }
}
