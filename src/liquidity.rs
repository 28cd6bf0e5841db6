// 2.0 liquidity.rs: concentrated-liquidity LP position on the AMM venue.
// value and skew always come from the sqrt-price invariant, never a linear approximation.
// 2.1 price update, 2.2 fee accrual, 2.3 rebalance, 2.4 capital moves.

use crate::types::{Price, Quote};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const HALF: Decimal = dec!(0.5);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LpParams {
    // ±fraction around the center price, 0.10 = ±10%
    pub range_width: Decimal,
    // max |skew - 0.5| before a rebalance is allowed
    pub rebalance_threshold: Decimal,
    // base pool APR before the concentration multiplier
    pub yield_rate: Decimal,
    pub gas_cost: Quote,
    // cost per unit of swapped value on rebalance
    pub slippage_rate: Decimal,
}

impl Default for LpParams {
    fn default() -> Self {
        Self {
            range_width: dec!(0.10),
            rebalance_threshold: dec!(0.20),
            yield_rate: dec!(0.05),
            gas_cost: Quote::new(dec!(2)),
            slippage_rate: dec!(0.001),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiquidityError {
    #[error("range width {0} must be strictly between 0 and 1")]
    InvalidRangeWidth(Decimal),

    #[error("numeric degenerate: {0}")]
    NumericDegenerate(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceOutcome {
    Skipped,
    Rebalanced { gas_cost: Quote, slippage_cost: Quote },
}

impl RebalanceOutcome {
    pub fn is_rebalanced(&self) -> bool {
        matches!(self, RebalanceOutcome::Rebalanced { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPosition {
    params: LpParams,
    value: Quote,
    current_price: Price,
    price_lower: Price,
    price_upper: Price,
    // L in the sqrt-price invariant
    liquidity: Decimal,
    // fraction of value held in the volatile asset
    skew: Decimal,
    multiplier: Decimal,
    accumulated_profit: Quote,
    cost_basis: Quote,
    rebalance_count: u32,
}

fn sqrt(value: Decimal) -> Decimal {
    value.sqrt().unwrap_or(Decimal::ZERO)
}

/// Capital-efficiency factor of a ±`range_width` position versus full range.
pub fn capital_efficiency_multiplier(range_width: Decimal) -> Decimal {
    let sa = sqrt((Decimal::ONE - range_width).max(dec!(0.0001)));
    let sb = sqrt(Decimal::ONE + range_width);
    let denom = dec!(2) - Decimal::ONE / sb - sa;
    if denom <= Decimal::ZERO {
        return Decimal::ONE;
    }
    dec!(2) / denom
}

/// Value and skew of a position holding `liquidity` at `price` inside [lower, upper].
pub fn position_value(
    liquidity: Decimal,
    price: Price,
    lower: Price,
    upper: Price,
) -> (Quote, Decimal) {
    let p = price.value();
    let sp = sqrt(p);
    let sa = sqrt(lower.value());
    let sb = sqrt(upper.value());

    if price <= lower {
        // all volatile asset
        let value = liquidity * (sb - sa) / (sa * sb) * p;
        (Quote::new(value), Decimal::ONE)
    } else if price >= upper {
        // all stable asset
        let value = liquidity * (sb - sa);
        (Quote::new(value), Decimal::ZERO)
    } else {
        let volatile_amount = liquidity * (sb - sp) / (sp * sb);
        let stable_amount = liquidity * (sp - sa);
        let volatile_value = volatile_amount * p;
        let value = volatile_value + stable_amount;
        let skew = if value > Decimal::ZERO {
            volatile_value / value
        } else {
            HALF
        };
        (Quote::new(value), skew)
    }
}

// L such that position_value(L, price, lower, upper) == value
fn liquidity_for_value(value: Quote, price: Price, lower: Price, upper: Price) -> Decimal {
    let (unit_value, _) = position_value(Decimal::ONE, price, lower, upper);
    if unit_value.value() <= Decimal::ZERO || !value.is_positive() {
        return Decimal::ZERO;
    }
    value.value() / unit_value.value()
}

impl LiquidityPosition {
    pub fn initialize(
        capital: Quote,
        start_price: Price,
        params: LpParams,
    ) -> Result<Self, LiquidityError> {
        if params.range_width <= Decimal::ZERO || params.range_width >= Decimal::ONE {
            return Err(LiquidityError::InvalidRangeWidth(params.range_width));
        }
        if !capital.is_positive() {
            return Err(LiquidityError::NumericDegenerate("zero total value locked"));
        }

        let price_lower = start_price.scaled(Decimal::ONE - params.range_width);
        let price_upper = start_price.scaled(Decimal::ONE + params.range_width);
        let multiplier = capital_efficiency_multiplier(params.range_width);
        let liquidity = liquidity_for_value(capital, start_price, price_lower, price_upper);
        let (value, skew) = position_value(liquidity, start_price, price_lower, price_upper);

        Ok(Self {
            params,
            value,
            current_price: start_price,
            price_lower,
            price_upper,
            liquidity,
            skew,
            multiplier,
            accumulated_profit: Quote::zero(),
            cost_basis: capital,
            rebalance_count: 0,
        })
    }

    pub fn params(&self) -> &LpParams {
        &self.params
    }

    pub fn value(&self) -> Quote {
        self.value
    }

    pub fn current_price(&self) -> Price {
        self.current_price
    }

    pub fn price_lower(&self) -> Price {
        self.price_lower
    }

    pub fn price_upper(&self) -> Price {
        self.price_upper
    }

    pub fn liquidity(&self) -> Decimal {
        self.liquidity
    }

    pub fn skew(&self) -> Decimal {
        self.skew
    }

    pub fn multiplier(&self) -> Decimal {
        self.multiplier
    }

    pub fn accumulated_profit(&self) -> Quote {
        self.accumulated_profit
    }

    pub fn cost_basis(&self) -> Quote {
        self.cost_basis
    }

    pub fn rebalance_count(&self) -> u32 {
        self.rebalance_count
    }

    pub fn is_in_range(&self) -> bool {
        self.price_lower < self.current_price && self.current_price < self.price_upper
    }

    pub fn drift(&self) -> Decimal {
        (self.skew - HALF).abs()
    }

    // 2.1: mark to market with the three-regime invariant
    pub fn update_price(&mut self, price: Price) {
        self.current_price = price;
        let (value, skew) = position_value(self.liquidity, price, self.price_lower, self.price_upper);
        self.value = value;
        self.skew = skew;
    }

    // 2.2: annualized rate split evenly across ticks. zero while out of range.
    pub fn accrue_fee(&mut self, ticks_per_year: Decimal) -> Quote {
        if !self.is_in_range() || !self.value.is_positive() || ticks_per_year <= Decimal::ZERO {
            return Quote::zero();
        }
        let rate_per_tick = self.params.yield_rate * self.multiplier / ticks_per_year;
        let fee = self.value.mul(rate_per_tick);
        self.set_value(self.value.add(fee));
        self.accumulated_profit = self.accumulated_profit.add(fee);
        fee
    }

    // 2.3: re-center on the current price once skew drifts past the threshold
    pub fn check_and_rebalance(&mut self) -> RebalanceOutcome {
        let drift = self.drift();
        if drift <= self.params.rebalance_threshold {
            return RebalanceOutcome::Skipped;
        }

        let slippage_cost = self.value.mul(drift * self.params.slippage_rate);
        let gas_cost = self.params.gas_cost;
        let remaining = self.value.sub(slippage_cost).sub(gas_cost).floor_zero();

        self.price_lower = self.current_price.scaled(Decimal::ONE - self.params.range_width);
        self.price_upper = self.current_price.scaled(Decimal::ONE + self.params.range_width);
        self.liquidity =
            liquidity_for_value(remaining, self.current_price, self.price_lower, self.price_upper);
        self.value = remaining;
        self.skew = HALF;
        self.rebalance_count += 1;

        RebalanceOutcome::Rebalanced {
            gas_cost,
            slippage_cost,
        }
    }

    pub fn volatile_inventory(&self) -> Decimal {
        if !self.value.is_positive() {
            return Decimal::ZERO;
        }
        self.value.value() * self.skew / self.current_price.value()
    }

    /// Profit above cost basis that a harvest may take out.
    pub fn harvestable_surplus(&self) -> Quote {
        self.value.sub(self.cost_basis).floor_zero()
    }

    // 2.4: capital moves. all of them rescale L so the next mark keeps the new value.

    pub fn deposit_capital(&mut self, amount: Quote) {
        if !amount.is_positive() {
            return;
        }
        self.set_value(self.value.add(amount));
        self.cost_basis = self.cost_basis.add(amount);
    }

    /// Returns the amount actually removed (capped at current value).
    pub fn withdraw_capital(&mut self, amount: Quote) -> Quote {
        let taken = amount.floor_zero().min(self.value);
        if taken.is_zero() {
            return taken;
        }
        self.set_value(self.value.sub(taken));
        self.cost_basis = self.cost_basis.sub(taken).floor_zero();
        taken
    }

    /// Takes value out of accrued profit. cost basis only moves when asked to.
    pub fn withdraw_profit(&mut self, amount: Quote, reduce_cost_basis: bool) -> Quote {
        let taken = amount.floor_zero().min(self.value);
        if taken.is_zero() {
            return taken;
        }
        self.set_value(self.value.sub(taken));
        self.accumulated_profit = self.accumulated_profit.sub(taken).floor_zero();
        if reduce_cost_basis {
            self.cost_basis = self.cost_basis.sub(taken).floor_zero();
        }
        taken
    }

    fn set_value(&mut self, new_value: Quote) {
        self.liquidity = liquidity_for_value(
            new_value,
            self.current_price,
            self.price_lower,
            self.price_upper,
        );
        self.value = new_value;
    }
}
