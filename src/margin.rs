//! Margin math for the hedge venue.
//!
//! Initial margin locked by a hedge is notional divided by leverage. The
//! exchange wallet backs every open position (cross margin), so the free
//! collateral for a new order is wallet cash plus unrealized PnL minus the
//! margin already locked.

use crate::types::{Leverage, Price, Quote};
use rust_decimal::Decimal;

pub fn notional_value(size: Decimal, price: Price) -> Quote {
    Quote::new(size.abs() * price.value())
}

pub fn initial_margin(notional: Quote, leverage: Leverage) -> Quote {
    Quote::new(notional.value() * leverage.initial_margin_fraction())
}

pub fn taker_fee(notional: Quote, taker_fee_rate: Decimal) -> Quote {
    Quote::new(notional.value() * taker_fee_rate)
}

/// Collateral still free for new positions: wallet + unrealized PnL - locked margin.
pub fn available_margin(wallet_balance: Quote, unrealized_pnl: Quote, margin_used: Quote) -> Quote {
    wallet_balance.add(unrealized_pnl).sub(margin_used)
}
