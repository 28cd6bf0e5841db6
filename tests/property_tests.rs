//! Property-based tests for the position math.
//!
//! These tests verify invariants hold under random inputs.

use hedged_lp_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (100i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $1 to $10,000
}

fn range_width_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=50i64).prop_map(|x| Decimal::new(x, 2)) // ±1% to ±50%
}

fn move_strategy() -> impl Strategy<Value = Decimal> {
    (500i64..=1500i64).prop_map(|x| Decimal::new(x, 3)) // 0.5x to 1.5x
}

fn size_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|x| Decimal::new(x, 4)) // 0.0001 to 10
}

fn lp(capital: Decimal, start: Decimal, range_width: Decimal) -> LiquidityPosition {
    let params = LpParams {
        range_width,
        ..LpParams::default()
    };
    LiquidityPosition::initialize(Quote::new(capital), Price::new_unchecked(start), params).unwrap()
}

fn book_at(price: Decimal) -> HedgeBook {
    let mut book = HedgeBook::new(HedgeParams::default());
    book.update_market_price(Price::new_unchecked(price));
    book
}

proptest! {
    /// A fresh position is worth exactly what was put in
    #[test]
    fn initial_value_matches_capital(
        start in price_strategy(),
        range_width in range_width_strategy(),
    ) {
        let position = lp(dec!(10000), start, range_width);
        let diff = (position.value().value() - dec!(10000)).abs();
        prop_assert!(diff < dec!(0.000001), "value drifted by {}", diff);
    }

    /// Skew stays in [0, 1] and pins to the edges outside the range
    #[test]
    fn skew_bounds(
        start in price_strategy(),
        range_width in range_width_strategy(),
        factor in move_strategy(),
    ) {
        let mut position = lp(dec!(10000), start, range_width);
        let price = Price::new_unchecked(start * factor);
        position.update_price(price);

        let skew = position.skew();
        prop_assert!(skew >= Decimal::ZERO && skew <= Decimal::ONE);
        if price <= position.price_lower() {
            prop_assert_eq!(skew, Decimal::ONE);
        } else if price >= position.price_upper() {
            prop_assert_eq!(skew, Decimal::ZERO);
        } else {
            prop_assert!(skew > Decimal::ZERO && skew < Decimal::ONE);
        }
    }

    /// Value never goes negative and fees only accrue in range
    #[test]
    fn fees_only_in_range(
        start in price_strategy(),
        range_width in range_width_strategy(),
        factor in move_strategy(),
    ) {
        let mut position = lp(dec!(10000), start, range_width);
        position.update_price(Price::new_unchecked(start * factor));
        let fee = position.accrue_fee(dec!(8760));

        prop_assert!(position.value().value() >= Decimal::ZERO);
        if position.is_in_range() {
            prop_assert!(fee.is_positive());
        } else {
            prop_assert!(fee.is_zero());
        }
    }

    /// Right after a rebalance skew is 0.5 and the range is centered on the rebalance price
    #[test]
    fn rebalance_recenters(
        start in price_strategy(),
        range_width in range_width_strategy(),
        factor in move_strategy(),
    ) {
        let mut position = lp(dec!(10000), start, range_width);
        let price = Price::new_unchecked(start * factor);
        position.update_price(price);

        if position.check_and_rebalance().is_rebalanced() {
            prop_assert_eq!(position.skew(), dec!(0.5));
            prop_assert_eq!(position.price_lower(), price.scaled(Decimal::ONE - range_width));
            prop_assert_eq!(position.price_upper(), price.scaled(Decimal::ONE + range_width));
            prop_assert!(position.is_in_range());
        }
    }

    /// Accepted opens leave free margin >= 0. Rejected opens change nothing.
    #[test]
    fn margin_invariant(
        price in price_strategy(),
        size in size_strategy(),
        collateral in 0i64..50_000i64,
    ) {
        let mut book = book_at(price);
        let collateral = Quote::new(Decimal::from(collateral));

        match book.open_or_increase(Side::Short, size, collateral) {
            Ok(fee) => {
                let wallet = collateral.sub(fee);
                let free = available_margin(wallet, book.total_unrealized_pnl(), book.total_margin_used());
                prop_assert!(!free.is_negative(), "free margin {} after accepted order", free);
                prop_assert_eq!(book.short_size(), size);
            }
            Err(HedgeError::InsufficientMargin { required, available }) => {
                prop_assert!(available < required);
                prop_assert!(book.is_flat());
                prop_assert!(book.total_margin_used().is_zero());
            }
            Err(other) => prop_assert!(false, "unexpected error {}", other),
        }
    }

    /// Closing half realizes half the pnl and frees half the margin
    #[test]
    fn partial_close_is_pro_rata(
        entry in price_strategy(),
        size in size_strategy(),
        factor in move_strategy(),
    ) {
        let mut book = book_at(entry);
        book.open_or_increase(Side::Short, size, Quote::new(dec!(1_000_000_000))).unwrap();
        book.update_market_price(Price::new_unchecked(entry * factor));

        let pnl_before = book.total_unrealized_pnl();
        let margin_before = book.total_margin_used();
        let result = book.reduce_or_close(Side::Short, size / dec!(2)).unwrap();

        prop_assert_eq!(result.realized_pnl, pnl_before.mul(dec!(0.5)));
        prop_assert_eq!(book.total_margin_used(), margin_before.sub(margin_before.mul(dec!(0.5))));
        prop_assert_eq!(book.short_size(), size - size / dec!(2));
    }

    /// Shorts receive positive funding, longs pay it
    #[test]
    fn funding_sign(
        price in price_strategy(),
        size in size_strategy(),
        rate_bps in 1i64..=100i64,
    ) {
        let rate = Decimal::new(rate_bps, 4);
        let mark = Price::new_unchecked(price);
        let short = calculate_funding_payment(Side::Short, size, mark, rate);
        let long = calculate_funding_payment(Side::Long, size, mark, rate);
        prop_assert!(short.is_positive());
        prop_assert_eq!(short.add(long), Quote::zero());
    }

    /// Deposits and withdrawals keep value and liquidity consistent at the current price
    #[test]
    fn capital_moves_rescale_liquidity(
        start in price_strategy(),
        range_width in range_width_strategy(),
        amount in 1i64..5_000i64,
    ) {
        let mut position = lp(dec!(10000), start, range_width);
        let amount = Quote::new(Decimal::from(amount));

        position.deposit_capital(amount);
        let price = position.current_price();
        position.update_price(price);
        let diff = (position.value().value() - dec!(10000) - amount.value()).abs();
        prop_assert!(diff < dec!(0.000001));

        let taken = position.withdraw_capital(amount);
        prop_assert_eq!(taken, amount);
        position.update_price(price);
        let diff = (position.value().value() - dec!(10000)).abs();
        prop_assert!(diff < dec!(0.000001));
    }
}
