// 3.0: hedge positions on the perp venue, at most one per side. pnl = size * (mark - entry) * sign.
// 3.1 open/increase, 3.2 reduce/close, 3.3 funding. the book also tracks cumulative fees and funding.

use crate::funding::calculate_funding_payment;
use crate::margin::{available_margin, initial_margin, notional_value, taker_fee};
use crate::types::{Leverage, Price, Quote, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgeParams {
    pub leverage: Leverage,
    pub taker_fee_rate: Decimal,
}

impl Default for HedgeParams {
    fn default() -> Self {
        Self {
            leverage: Leverage::one(),
            taker_fee_rate: dec!(0.0005),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HedgeError {
    #[error("insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Quote, available: Quote },

    #[error("no mark price set on the hedge venue")]
    NoMarkPrice,

    #[error("invalid order size {0}")]
    InvalidSize(Decimal),
}

impl HedgeError {
    /// How much collateral is missing, for margin rejections.
    pub fn deficit(&self) -> Option<Quote> {
        match self {
            HedgeError::InsufficientMargin {
                required,
                available,
            } => Some(required.sub(*available).floor_zero()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgePosition {
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Price,
    pub unrealized_pnl: Quote,
    pub margin_used: Quote,
}

impl HedgePosition {
    pub fn notional_value(&self, mark_price: Price) -> Quote {
        notional_value(self.size, mark_price)
    }

    fn mark(&mut self, mark_price: Price) {
        self.unrealized_pnl = calculate_unrealized_pnl(self.side, self.size, self.entry_price, mark_price);
    }
}

pub fn calculate_unrealized_pnl(side: Side, size: Decimal, entry_price: Price, mark_price: Price) -> Quote {
    Quote::new(side.sign() * size * (mark_price.value() - entry_price.value()))
}

// volume weighted entry after adding to a position
pub fn blended_entry_price(old_size: Decimal, old_entry: Price, add_size: Decimal, fill_price: Price) -> Price {
    let total = old_size + add_size;
    if total <= Decimal::ZERO {
        return fill_price;
    }
    let weighted = old_size * old_entry.value() + add_size * fill_price.value();
    Price::new_unchecked(weighted / total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseResult {
    pub closed_size: Decimal,
    pub realized_pnl: Quote,
    pub fee: Quote,
}

impl CloseResult {
    fn empty() -> Self {
        Self {
            closed_size: Decimal::ZERO,
            realized_pnl: Quote::zero(),
            fee: Quote::zero(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeBook {
    params: HedgeParams,
    positions: BTreeMap<Side, HedgePosition>,
    mark_price: Option<Price>,
    total_trading_fees: Quote,
    total_funding: Quote,
}

impl HedgeBook {
    pub fn new(params: HedgeParams) -> Self {
        Self {
            params,
            positions: BTreeMap::new(),
            mark_price: None,
            total_trading_fees: Quote::zero(),
            total_funding: Quote::zero(),
        }
    }

    pub fn params(&self) -> &HedgeParams {
        &self.params
    }

    pub fn mark_price(&self) -> Option<Price> {
        self.mark_price
    }

    pub fn position(&self, side: Side) -> Option<&HedgePosition> {
        self.positions.get(&side)
    }

    pub fn size(&self, side: Side) -> Decimal {
        self.positions.get(&side).map(|p| p.size).unwrap_or(Decimal::ZERO)
    }

    pub fn short_size(&self) -> Decimal {
        self.size(Side::Short)
    }

    pub fn total_margin_used(&self) -> Quote {
        self.positions.values().map(|p| p.margin_used).sum()
    }

    pub fn total_unrealized_pnl(&self) -> Quote {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    pub fn total_trading_fees(&self) -> Quote {
        self.total_trading_fees
    }

    pub fn total_funding(&self) -> Quote {
        self.total_funding
    }

    pub fn is_flat(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn update_market_price(&mut self, price: Price) {
        self.mark_price = Some(price);
        for position in self.positions.values_mut() {
            position.mark(price);
        }
    }

    // 3.1: margin is checked against wallet + pnl - locked before anything changes.
    // returns the taker fee the wallet owes.
    pub fn open_or_increase(
        &mut self,
        side: Side,
        add_size: Decimal,
        available_collateral: Quote,
    ) -> Result<Quote, HedgeError> {
        let price = self.mark_price.ok_or(HedgeError::NoMarkPrice)?;
        if add_size <= Decimal::ZERO {
            return Err(HedgeError::InvalidSize(add_size));
        }

        let notional = notional_value(add_size, price);
        let fee = taker_fee(notional, self.params.taker_fee_rate);
        let added_margin = initial_margin(notional, self.params.leverage);

        let available = available_margin(
            available_collateral,
            self.total_unrealized_pnl(),
            self.total_margin_used(),
        );
        let required = added_margin.add(fee);
        if available < required {
            return Err(HedgeError::InsufficientMargin {
                required,
                available,
            });
        }

        let position = self.positions.entry(side).or_insert_with(|| HedgePosition {
            side,
            size: Decimal::ZERO,
            entry_price: price,
            unrealized_pnl: Quote::zero(),
            margin_used: Quote::zero(),
        });
        position.entry_price = blended_entry_price(position.size, position.entry_price, add_size, price);
        position.size += add_size;
        position.margin_used = position.margin_used.add(added_margin);
        position.mark(price);

        self.total_trading_fees = self.total_trading_fees.add(fee);
        Ok(fee)
    }

    // 3.2: partial closes realize pnl and release margin pro rata.
    pub fn reduce_or_close(&mut self, side: Side, close_size: Decimal) -> Result<CloseResult, HedgeError> {
        let price = self.mark_price.ok_or(HedgeError::NoMarkPrice)?;
        if close_size <= Decimal::ZERO {
            return Err(HedgeError::InvalidSize(close_size));
        }
        let Some(position) = self.positions.get_mut(&side) else {
            return Ok(CloseResult::empty());
        };

        let result = if close_size >= position.size {
            let result = CloseResult {
                closed_size: position.size,
                realized_pnl: position.unrealized_pnl,
                fee: taker_fee(notional_value(position.size, price), self.params.taker_fee_rate),
            };
            self.positions.remove(&side);
            result
        } else {
            let ratio = close_size / position.size;
            let result = CloseResult {
                closed_size: close_size,
                realized_pnl: position.unrealized_pnl.mul(ratio),
                fee: taker_fee(notional_value(close_size, price), self.params.taker_fee_rate),
            };
            position.size -= close_size;
            position.margin_used = position.margin_used.sub(position.margin_used.mul(ratio));
            position.mark(price);
            result
        };

        self.total_trading_fees = self.total_trading_fees.add(result.fee);
        Ok(result)
    }

    // 3.3: positive rate = longs pay shorts. returns the net amount received.
    pub fn apply_funding(&mut self, rate: Decimal) -> Quote {
        let Some(price) = self.mark_price else {
            return Quote::zero();
        };
        let mut net = Quote::zero();
        for position in self.positions.values() {
            net = net.add(calculate_funding_payment(position.side, position.size, price, rate));
        }
        self.total_funding = self.total_funding.add(net);
        net
    }
}
