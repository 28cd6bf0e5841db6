// 15.0: summary statistics derived from a finished run.
// wealth = net equity + everything harvested out. drawdown and sharpe are measured on wealth, so
// a harvest never looks like a loss.

use crate::engine::{RunCounters, RunOutput};
use crate::funding::MINUTES_PER_YEAR;
use crate::ledger::{SimulationState, TransactionCategory};
use crate::types::Quote;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    pub initial_capital: Quote,
    pub final_equity: Quote,
    pub total_withdrawn: Quote,
    pub total_wealth: Quote,
    pub net_profit: Quote,
    pub days: Decimal,
    pub cagr_pct: Decimal,
    /// Deepest peak-to-trough fall of wealth, as a non-positive percentage.
    pub max_drawdown_pct: Decimal,
    pub sharpe: Decimal,
    pub min_available_margin: Quote,
    pub counters: RunCounters,
    pub breakdown: BTreeMap<TransactionCategory, Quote>,
}

impl SummaryStats {
    pub fn from_run(run: &RunOutput) -> Self {
        let initial_capital = run.ledger.initial_capital();
        let final_equity = run.final_equity();
        let total_withdrawn = run.ledger.total_withdrawn();
        let total_wealth = final_equity.add(total_withdrawn);
        let net_profit = total_wealth.sub(initial_capital);

        let days = match (run.states.first(), run.states.last()) {
            (Some(first), Some(last)) => first.timestamp.elapsed_days(&last.timestamp),
            _ => Decimal::ZERO,
        };
        let wealth = wealth_series(&run.states);
        let rows_per_year = Decimal::from(MINUTES_PER_YEAR) / Decimal::from(run.interval_minutes.max(1));

        Self {
            initial_capital,
            final_equity,
            total_withdrawn,
            total_wealth,
            net_profit,
            days,
            cagr_pct: cagr_pct(net_profit, initial_capital, days),
            max_drawdown_pct: max_drawdown_pct(&wealth),
            sharpe: sharpe_ratio(&wealth, rows_per_year),
            min_available_margin: run
                .states
                .iter()
                .map(|s| s.available_margin)
                .min()
                .unwrap_or_else(Quote::zero),
            counters: run.counters,
            breakdown: run.ledger.totals().clone(),
        }
    }

    pub fn survived(&self) -> bool {
        self.counters.margin_call_rejects == 0
    }
}

pub fn wealth_series(states: &[SimulationState]) -> Vec<Decimal> {
    states
        .iter()
        .map(|s| s.net_equity.add(s.total_withdrawn).value())
        .collect()
}

// (1 + roi)^(365 / days) - 1, in percent. a total loss reads -100.
pub fn cagr_pct(net_profit: Quote, initial_capital: Quote, days: Decimal) -> Decimal {
    if !initial_capital.is_positive() {
        return Decimal::ZERO;
    }
    let growth = Decimal::ONE + net_profit.value() / initial_capital.value();
    if growth <= Decimal::ZERO {
        return dec!(-100);
    }
    if days <= Decimal::ZERO {
        return (growth - Decimal::ONE) * dec!(100);
    }
    growth
        .checked_powd(dec!(365) / days)
        .map(|g| (g - Decimal::ONE) * dec!(100))
        .unwrap_or(Decimal::MAX)
}

pub fn max_drawdown_pct(wealth: &[Decimal]) -> Decimal {
    let mut peak = Decimal::MIN;
    let mut worst = Decimal::ZERO;
    for &w in wealth {
        peak = peak.max(w);
        if peak > Decimal::ZERO {
            worst = worst.min((w - peak) / peak);
        }
    }
    worst * dec!(100)
}

// mean over sample std of row returns, scaled by sqrt(rows per year). only meaningful when every
// tick was recorded.
pub fn sharpe_ratio(wealth: &[Decimal], rows_per_year: Decimal) -> Decimal {
    let returns: Vec<Decimal> = wealth
        .windows(2)
        .filter(|pair| !pair[0].is_zero())
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect();
    if returns.len() < 2 {
        return Decimal::ZERO;
    }

    let n = Decimal::from(returns.len());
    let mean = returns.iter().sum::<Decimal>() / n;
    let variance = returns.iter().map(|r| (*r - mean) * (*r - mean)).sum::<Decimal>() / (n - Decimal::ONE);
    match (variance.sqrt(), rows_per_year.sqrt()) {
        (Some(std), Some(scale)) if std > Decimal::ZERO => mean / std * scale,
        _ => Decimal::ZERO,
    }
}
