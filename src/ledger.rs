// 6.0: dual-venue bookkeeping. every cash movement is posted here under a closed category.
// wallet-settled categories move exchange wallet cash. lp-settled ones already live inside
// the lp position value and are only tracked. equity = wallet + lp value + hedge pnl.

use crate::events::EventTag;
use crate::types::{Price, Quote, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransactionCategory {
    // lp-settled
    LpFee,
    Gas,
    Slippage,
    RescueWithdrawal,
    Withdrawal,

    // wallet-settled
    HedgeFee,
    FundingRevenue,
    FundingExpense,
    RealizedPnl,
    Deposit,
    SweepToExchange,
    SweepToLp,
}

impl TransactionCategory {
    pub const ALL: [TransactionCategory; 12] = [
        TransactionCategory::LpFee,
        TransactionCategory::Gas,
        TransactionCategory::Slippage,
        TransactionCategory::RescueWithdrawal,
        TransactionCategory::Withdrawal,
        TransactionCategory::HedgeFee,
        TransactionCategory::FundingRevenue,
        TransactionCategory::FundingExpense,
        TransactionCategory::RealizedPnl,
        TransactionCategory::Deposit,
        TransactionCategory::SweepToExchange,
        TransactionCategory::SweepToLp,
    ];

    pub fn moves_wallet_cash(&self) -> bool {
        match self {
            TransactionCategory::LpFee
            | TransactionCategory::Gas
            | TransactionCategory::Slippage
            | TransactionCategory::RescueWithdrawal
            | TransactionCategory::Withdrawal => false,
            TransactionCategory::HedgeFee
            | TransactionCategory::FundingRevenue
            | TransactionCategory::FundingExpense
            | TransactionCategory::RealizedPnl
            | TransactionCategory::Deposit
            | TransactionCategory::SweepToExchange
            | TransactionCategory::SweepToLp => true,
        }
    }

    // counted in cumulative costs on the snapshot
    pub fn is_trading_cost(&self) -> bool {
        matches!(
            self,
            TransactionCategory::Gas | TransactionCategory::HedgeFee | TransactionCategory::Slippage
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::LpFee => "REVENUE_LP_FEE",
            TransactionCategory::Gas => "EXPENSE_GAS",
            TransactionCategory::Slippage => "EXPENSE_SLIPPAGE",
            TransactionCategory::RescueWithdrawal => "RESCUE_WITHDRAWAL",
            TransactionCategory::Withdrawal => "WITHDRAWAL",
            TransactionCategory::HedgeFee => "EXPENSE_HEDGE_FEE",
            TransactionCategory::FundingRevenue => "REVENUE_FUNDING",
            TransactionCategory::FundingExpense => "EXPENSE_FUNDING",
            TransactionCategory::RealizedPnl => "REALIZED_PNL",
            TransactionCategory::Deposit => "DEPOSIT",
            TransactionCategory::SweepToExchange => "SWEEP_TO_EXCHANGE",
            TransactionCategory::SweepToLp => "SWEEP_TO_LP",
        }
    }
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction category {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for TransactionCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Venue {
    Lp,
    Exchange,
}

/// One row of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    pub timestamp: Timestamp,
    pub price: Price,
    pub net_equity: Quote,
    pub wallet_balance: Quote,
    pub available_margin: Quote,
    pub lp_value: Quote,
    pub hedge_unrealized_pnl: Quote,
    pub lp_inventory: Decimal,
    pub hedge_size: Decimal,
    pub residual_delta: Decimal,
    pub cumulative_fees: Quote,
    pub cumulative_costs: Quote,
    pub total_withdrawn: Quote,
    pub tags: Vec<EventTag>,
}

impl SimulationState {
    pub fn with_inventory(mut self, lp_inventory: Decimal, hedge_size: Decimal) -> Self {
        self.lp_inventory = lp_inventory;
        self.hedge_size = hedge_size;
        self.residual_delta = lp_inventory - hedge_size;
        self
    }

    pub fn with_tags(mut self, tags: Vec<EventTag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn has_tag(&self, tag: EventTag) -> bool {
        self.tags.contains(&tag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    initial_capital: Quote,
    unallocated: Quote,
    wallet_balance: Quote,
    lp_allocated_capital: Quote,
    total_withdrawn: Quote,
    totals: BTreeMap<TransactionCategory, Quote>,
}

impl Ledger {
    pub fn new(initial_capital: Quote) -> Self {
        Self {
            initial_capital,
            unallocated: initial_capital.floor_zero(),
            wallet_balance: Quote::zero(),
            lp_allocated_capital: Quote::zero(),
            total_withdrawn: Quote::zero(),
            totals: TransactionCategory::ALL.iter().map(|c| (*c, Quote::zero())).collect(),
        }
    }

    pub fn initial_capital(&self) -> Quote {
        self.initial_capital
    }

    pub fn unallocated(&self) -> Quote {
        self.unallocated
    }

    pub fn wallet_balance(&self) -> Quote {
        self.wallet_balance
    }

    pub fn lp_allocated_capital(&self) -> Quote {
        self.lp_allocated_capital
    }

    pub fn total_withdrawn(&self) -> Quote {
        self.total_withdrawn
    }

    pub fn total(&self, category: TransactionCategory) -> Quote {
        self.totals.get(&category).copied().unwrap_or_else(Quote::zero)
    }

    pub fn totals(&self) -> &BTreeMap<TransactionCategory, Quote> {
        &self.totals
    }

    pub fn cumulative_fees(&self) -> Quote {
        self.total(TransactionCategory::LpFee)
    }

    pub fn cumulative_costs(&self) -> Quote {
        TransactionCategory::ALL
            .iter()
            .filter(|c| c.is_trading_cost())
            .map(|c| self.total(*c).abs())
            .sum()
    }

    // 6.1: capped at what is still unallocated. returns the amount moved.
    pub fn allocate(&mut self, amount: Quote, venue: Venue) -> Quote {
        let allocation = amount.floor_zero().min(self.unallocated);
        self.unallocated = self.unallocated.sub(allocation);
        match venue {
            Venue::Lp => self.lp_allocated_capital = self.lp_allocated_capital.add(allocation),
            Venue::Exchange => self.wallet_balance = self.wallet_balance.add(allocation),
        }
        allocation
    }

    // 6.2: signed amount, negative for expenses and outflows
    pub fn record_transaction(&mut self, category: TransactionCategory, amount: Quote) {
        let entry = self.totals.entry(category).or_insert_with(Quote::zero);
        *entry = entry.add(amount);

        if category.moves_wallet_cash() {
            self.wallet_balance = self.wallet_balance.add(amount);
        }

        match category {
            TransactionCategory::Withdrawal => {
                self.total_withdrawn = self.total_withdrawn.add(amount.abs());
            }
            // sweeps are posted from the wallet's side, so the lp moves the other way
            TransactionCategory::SweepToLp | TransactionCategory::SweepToExchange => {
                self.lp_allocated_capital = self.lp_allocated_capital.sub(amount).floor_zero();
            }
            TransactionCategory::RescueWithdrawal => {
                self.lp_allocated_capital = self.lp_allocated_capital.add(amount).floor_zero();
            }
            _ => {}
        }
    }

    pub fn net_equity(&self, lp_value: Quote, hedge_pnl: Quote) -> Quote {
        self.wallet_balance.add(lp_value).add(hedge_pnl)
    }

    // 6.3: inventory and tags are filled in by the engine
    pub fn snapshot(
        &self,
        timestamp: Timestamp,
        price: Price,
        lp_value: Quote,
        hedge_pnl: Quote,
        margin_used: Quote,
    ) -> SimulationState {
        SimulationState {
            timestamp,
            price,
            net_equity: self.net_equity(lp_value, hedge_pnl),
            wallet_balance: self.wallet_balance,
            available_margin: self.wallet_balance.add(hedge_pnl).sub(margin_used),
            lp_value,
            hedge_unrealized_pnl: hedge_pnl,
            lp_inventory: Decimal::ZERO,
            hedge_size: Decimal::ZERO,
            residual_delta: Decimal::ZERO,
            cumulative_fees: self.cumulative_fees(),
            cumulative_costs: self.cumulative_costs(),
            total_withdrawn: self.total_withdrawn,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn funded_ledger() -> Ledger {
        let mut ledger = Ledger::new(Quote::new(dec!(15000)));
        ledger.allocate(Quote::new(dec!(10000)), Venue::Lp);
        ledger.allocate(Quote::new(dec!(5000)), Venue::Exchange);
        ledger
    }

    #[test]
    fn allocation_is_capped() {
        let mut ledger = Ledger::new(Quote::new(dec!(1000)));
        assert_eq!(ledger.allocate(Quote::new(dec!(600)), Venue::Lp).value(), dec!(600));
        assert_eq!(ledger.allocate(Quote::new(dec!(600)), Venue::Exchange).value(), dec!(400));
        assert_eq!(ledger.unallocated(), Quote::zero());
        assert_eq!(ledger.wallet_balance().value(), dec!(400));
        assert_eq!(ledger.lp_allocated_capital().value(), dec!(600));
    }

    #[test]
    fn wallet_categories_move_cash() {
        let mut ledger = funded_ledger();
        ledger.record_transaction(TransactionCategory::HedgeFee, Quote::new(dec!(-2)));
        ledger.record_transaction(TransactionCategory::FundingRevenue, Quote::new(dec!(0.5)));
        ledger.record_transaction(TransactionCategory::RealizedPnl, Quote::new(dec!(-100)));
        assert_eq!(ledger.wallet_balance().value(), dec!(4898.5));
    }

    #[test]
    fn lp_categories_leave_wallet_alone() {
        let mut ledger = funded_ledger();
        ledger.record_transaction(TransactionCategory::LpFee, Quote::new(dec!(3)));
        ledger.record_transaction(TransactionCategory::Gas, Quote::new(dec!(-2)));
        ledger.record_transaction(TransactionCategory::Slippage, Quote::new(dec!(-1)));
        assert_eq!(ledger.wallet_balance().value(), dec!(5000));
        assert_eq!(ledger.cumulative_fees().value(), dec!(3));
        assert_eq!(ledger.total(TransactionCategory::Gas).value(), dec!(-2));
    }

    #[test]
    fn withdrawals_are_counted() {
        let mut ledger = funded_ledger();
        ledger.record_transaction(TransactionCategory::Withdrawal, Quote::new(dec!(-50)));
        ledger.record_transaction(TransactionCategory::Withdrawal, Quote::new(dec!(-25)));
        assert_eq!(ledger.total_withdrawn().value(), dec!(75));
        assert_eq!(ledger.wallet_balance().value(), dec!(5000));
    }

    #[test]
    fn sweeps_shift_allocation() {
        let mut ledger = funded_ledger();
        ledger.record_transaction(TransactionCategory::SweepToLp, Quote::new(dec!(-500)));
        assert_eq!(ledger.wallet_balance().value(), dec!(4500));
        assert_eq!(ledger.lp_allocated_capital().value(), dec!(10500));

        ledger.record_transaction(TransactionCategory::SweepToExchange, Quote::new(dec!(200)));
        assert_eq!(ledger.wallet_balance().value(), dec!(4700));
        assert_eq!(ledger.lp_allocated_capital().value(), dec!(10300));
    }

    #[test]
    fn costs_sum_absolute_values() {
        let mut ledger = funded_ledger();
        ledger.record_transaction(TransactionCategory::Gas, Quote::new(dec!(-2)));
        ledger.record_transaction(TransactionCategory::HedgeFee, Quote::new(dec!(-1.5)));
        ledger.record_transaction(TransactionCategory::Slippage, Quote::new(dec!(-0.5)));
        // funding is not a trading cost
        ledger.record_transaction(TransactionCategory::FundingExpense, Quote::new(dec!(-9)));
        assert_eq!(ledger.cumulative_costs().value(), dec!(4));
    }

    #[test]
    fn snapshot_equity_and_margin() {
        let ledger = funded_ledger();
        let state = ledger
            .snapshot(
                Timestamp::from_millis(0),
                Price::new_unchecked(dec!(2000)),
                Quote::new(dec!(10100)),
                Quote::new(dec!(-50)),
                Quote::new(dec!(2500)),
            )
            .with_inventory(dec!(2.5), dec!(2.4));

        assert_eq!(state.net_equity.value(), dec!(15050));
        assert_eq!(state.available_margin.value(), dec!(2450));
        assert_eq!(state.residual_delta, dec!(0.1));
    }

    #[test]
    fn category_names_parse_back() {
        for category in TransactionCategory::ALL {
            assert_eq!(category.as_str().parse::<TransactionCategory>().unwrap(), category);
        }
        assert!("BRIBE".parse::<TransactionCategory>().is_err());
    }
}
