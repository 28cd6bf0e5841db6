// 4.0: funding and time normalisation. every 8hrs longs pay shorts or vice versa.
// all per-tick rates in the crate come from an annual (or per-8h) rate divided by ticks, never compounded.
// 4.1 has the schedule. 4.2 has the payment.

use crate::types::{Price, Quote, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_YEAR: u32 = 525_600;
pub const FUNDING_PERIOD_MINUTES: u32 = 480;

// 4.1: derived once from the execution interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingSchedule {
    pub interval_minutes: u32,
    pub ticks_per_funding: u32,
    pub ticks_per_year: Decimal,
}

impl FundingSchedule {
    pub fn new(interval_minutes: u32) -> Self {
        let interval = interval_minutes.max(1);
        Self {
            interval_minutes: interval,
            ticks_per_funding: (FUNDING_PERIOD_MINUTES / interval).max(1),
            ticks_per_year: Decimal::from(MINUTES_PER_YEAR) / Decimal::from(interval),
        }
    }

    // never on tick 0, then every ticks_per_funding ticks
    pub fn is_funding_tick(&self, tick: usize) -> bool {
        tick > 0 && tick % self.ticks_per_funding as usize == 0
    }

    /// Rate charged on one funding tick. Ticks longer than the 8h period pay for every period
    /// they span, so a 12h tick pays 1.5 periods.
    pub fn settlement_rate(&self, rate_per_8h: Decimal) -> Decimal {
        if self.interval_minutes > FUNDING_PERIOD_MINUTES {
            rate_per_8h * Decimal::from(self.interval_minutes) / Decimal::from(FUNDING_PERIOD_MINUTES)
        } else {
            rate_per_8h
        }
    }

    // ticks per `days`, at least 1
    pub fn ticks_per_days(&self, days: u32) -> usize {
        let minutes = days as usize * 1440;
        (minutes / self.interval_minutes as usize).max(1)
    }
}

// 4.2: what one side pays or receives. positive = received.
pub fn calculate_funding_payment(side: Side, size: Decimal, mark_price: Price, funding_rate: Decimal) -> Quote {
    let gross = size.abs() * mark_price.value() * funding_rate;
    match side {
        Side::Short => Quote::new(gross),
        Side::Long => Quote::new(-gross),
    }
}
