//! Exchange margin sizing for the short hedge.
//!
//! A value-at-risk style estimate: assume the volatile asset follows geometric Brownian motion,
//! find the up-move that is only exceeded with probability `1 - confidence` over the horizon, and
//! size the exchange wallet so the hedge survives that move on top of its initial margin.
//! The horizon is usually the cross-margin sweep cadence, since a sweep refills the wallet.

use crate::types::{Leverage, Quote};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Confidence levels reported when the caller does not pick any.
pub const DEFAULT_CONFIDENCE_LEVELS: [Decimal; 4] = [dec!(0.90), dec!(0.95), dec!(0.99), dec!(0.999)];

const BISECTION_STEPS: usize = 80;
const Z_BOUND: Decimal = dec!(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginRiskParams {
    pub lp_capital: Quote,
    pub leverage: Leverage,
    /// Annualised volatility, e.g. 0.8 for 80%.
    pub annual_volatility: Decimal,
    pub horizon_days: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginEstimate {
    pub confidence: Decimal,
    pub z_score: Decimal,
    /// Fractional price rise, 0.25 = +25%.
    pub max_up_move: Decimal,
    pub expected_hedge_loss: Quote,
    pub recommended_exchange_capital: Quote,
}

impl MarginRiskParams {
    // the starting hedge covers half the lp, so half the lp is the short notional
    pub fn base_margin(&self) -> Quote {
        self.lp_capital.mul(dec!(0.5) * self.leverage.initial_margin_fraction())
    }

    /// None when the confidence is outside (0, 1) or the move overflows.
    pub fn estimate(&self, confidence: Decimal) -> Option<MarginEstimate> {
        let z_score = inverse_norm_cdf(confidence)?;
        let horizon_years = self.horizon_days.max(Decimal::ZERO) / dec!(365);
        let log_move = self.annual_volatility * horizon_years.sqrt()? * z_score;
        let max_up_move = log_move.checked_exp()? - Decimal::ONE;

        // the lp gains what the short loses on the hedged half
        let expected_hedge_loss = self.lp_capital.mul(max_up_move / dec!(2)).floor_zero();
        Some(MarginEstimate {
            confidence,
            z_score,
            max_up_move,
            expected_hedge_loss,
            recommended_exchange_capital: self.base_margin().add(expected_hedge_loss),
        })
    }

    pub fn estimates(&self, confidence_levels: &[Decimal]) -> Vec<MarginEstimate> {
        confidence_levels.iter().filter_map(|c| self.estimate(*c)).collect()
    }
}

/// Standard normal quantile by bisection on the cdf.
pub fn inverse_norm_cdf(p: Decimal) -> Option<Decimal> {
    if p <= Decimal::ZERO || p >= Decimal::ONE {
        return None;
    }
    let (mut lo, mut hi) = (-Z_BOUND, Z_BOUND);
    for _ in 0..BISECTION_STEPS {
        let mid = (lo + hi) / dec!(2);
        if mid.norm_cdf() < p {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some((lo + hi) / dec!(2))
}
