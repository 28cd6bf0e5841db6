// 8.5 engine/capital.rs: periodic capital moves between venues and out of the system.
// the sweep steers lp share of (lp + wallet) back toward the target ratio. the harvest takes a fixed
// amount of lp profit out for good, tracked as withdrawn wealth.

use super::core::Backtest;
use crate::events::{CrossSweepEvent, EventPayload, HarvestEvent, SweepDirection};
use crate::ledger::TransactionCategory;
use crate::types::Quote;
use tracing::debug;

impl Backtest {
    pub(super) fn sweep_phase(&mut self, index: usize) {
        let sweep = &self.config.cross_margin;
        if !sweep.enabled || !self.is_cadence_tick(index, sweep.frequency_days) {
            return;
        }
        self.cross_margin_sweep();
    }

    pub(super) fn harvest_phase(&mut self, index: usize) {
        let harvest = &self.config.harvesting;
        if !harvest.enabled || !self.is_cadence_tick(index, harvest.frequency_days) {
            return;
        }
        self.harvest();
    }

    /// Moves `transfer_fraction` of the gap when it exceeds `min_deviation` of the total.
    /// Cash only goes to the lp out of unlocked wallet funds. Returns the amount moved.
    pub fn cross_margin_sweep(&mut self) -> Quote {
        let lp_value = self.lp.value();
        let wallet = self.ledger.wallet_balance();
        let total = lp_value.add(wallet);
        if !total.is_positive() {
            return Quote::zero();
        }

        let params = &self.config.cross_margin;
        let target_lp = total.mul(self.sweep_target_ratio);
        let gap = lp_value.sub(target_lp);
        if gap.abs() <= total.mul(params.min_deviation) {
            return Quote::zero();
        }
        let wanted = gap.abs().mul(params.transfer_fraction);
        let lp_ratio_before = lp_value.value() / total.value();

        let (direction, moved) = if gap.is_positive() {
            let moved = self.lp.withdraw_capital(wanted);
            if moved.is_zero() {
                return moved;
            }
            self.ledger
                .record_transaction(TransactionCategory::SweepToExchange, moved);
            (SweepDirection::LpToExchange, moved)
        } else {
            let unlocked = wallet.min(self.available_margin()).floor_zero();
            let moved = wanted.min(unlocked);
            if moved.is_zero() {
                return moved;
            }
            self.lp.deposit_capital(moved);
            self.ledger
                .record_transaction(TransactionCategory::SweepToLp, moved.negate());
            (SweepDirection::ExchangeToLp, moved)
        };

        self.counters.sweeps += 1;
        debug!(direction = ?direction, amount = %moved, lp_ratio = %lp_ratio_before, "cross sweep");
        self.emit_event(EventPayload::CrossSweep(CrossSweepEvent {
            direction,
            amount: moved,
            lp_ratio_before,
            target_ratio: self.sweep_target_ratio,
        }));
        moved
    }

    /// Withdraws exactly the target when profit above cost basis covers it, else nothing.
    pub fn harvest(&mut self) -> Quote {
        let target = self.config.harvesting.withdrawal_target;
        if !target.is_positive() || self.lp.harvestable_surplus() < target {
            return Quote::zero();
        }

        let taken = self.lp.withdraw_profit(target, false);
        self.ledger
            .record_transaction(TransactionCategory::Withdrawal, taken.negate());
        self.counters.harvests += 1;

        debug!(amount = %taken, total_withdrawn = %self.ledger.total_withdrawn(), "harvest");
        self.emit_event(EventPayload::Harvest(HarvestEvent {
            amount: taken,
            total_withdrawn: self.ledger.total_withdrawn(),
        }));
        taken
    }
}
