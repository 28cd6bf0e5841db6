// 5.0: hedge policy. trend indicator + inventory in, target short size out.
// 5.1 indicator (ema with a hysteresis band), 5.2 order decision with safety net and drift threshold.
// the policy only ever reads inventory and hedge size through the two traits below.

use crate::liquidity::LiquidityPosition;
use crate::position::HedgeBook;
use crate::price_feed::PricePoint;
use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Volatile-asset amount a hedge must offset.
pub trait InventorySource {
    fn volatile_inventory(&self) -> Decimal;
}

/// Current short hedge size on the perp venue.
pub trait HedgeExposure {
    fn hedge_size(&self) -> Decimal;
}

impl InventorySource for LiquidityPosition {
    fn volatile_inventory(&self) -> Decimal {
        LiquidityPosition::volatile_inventory(self)
    }
}

// several lp tiers hedge as one book
impl<T: InventorySource> InventorySource for [T] {
    fn volatile_inventory(&self) -> Decimal {
        self.iter().map(|source| source.volatile_inventory()).sum()
    }
}

impl HedgeExposure for HedgeBook {
    fn hedge_size(&self) -> Decimal {
        self.short_size()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeMode {
    // hedge the full inventory on every tick
    Always,
    // follow the ema trend signal
    Trend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub hedge_mode: HedgeMode,
    // relative drift between target and current hedge before re-delta
    pub hedge_threshold: Decimal,
    pub use_safety_net: bool,
    // |single tick move| that forces the hedge back on
    pub safety_net_pct: Decimal,
    pub ema_period: u32,
    pub hysteresis_band_pct: Decimal,
    // gaps below this are dust, never traded
    pub min_order_size: Decimal,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            hedge_mode: HedgeMode::Trend,
            hedge_threshold: dec!(0.05),
            use_safety_net: true,
            safety_net_pct: dec!(0.02),
            ema_period: 200,
            hysteresis_band_pct: dec!(0.005),
            min_order_size: dec!(0.0001),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    // -1: price below the band, short the inventory
    HedgeOn,
    // +1: price above the band, run the lp unhedged
    HedgeOff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorTick {
    pub timestamp: Timestamp,
    pub price: Price,
    pub ema: Decimal,
    pub upper_band: Decimal,
    pub lower_band: Decimal,
    pub pct_change: Decimal,
    pub signal: Signal,
}

// 5.1: ema seeded with the first close (no warmup bias correction).
// inside the band the last signal carries forward, hedge-on before any crossing.
pub fn populate_indicators(series: &[PricePoint], params: &StrategyParams) -> Vec<IndicatorTick> {
    let alpha = dec!(2) / Decimal::from(params.ema_period.max(1) + 1);
    let mut ticks = Vec::with_capacity(series.len());
    let mut ema: Option<Decimal> = None;
    let mut prev_price: Option<Price> = None;
    let mut signal = Signal::HedgeOn;

    for point in series {
        let close = point.price.value();
        let next_ema = match ema {
            Some(prev) => alpha * close + (Decimal::ONE - alpha) * prev,
            None => close,
        };
        ema = Some(next_ema);

        let upper_band = next_ema * (Decimal::ONE + params.hysteresis_band_pct);
        let lower_band = next_ema * (Decimal::ONE - params.hysteresis_band_pct);
        if close > upper_band {
            signal = Signal::HedgeOff;
        } else if close < lower_band {
            signal = Signal::HedgeOn;
        }

        let pct_change = prev_price
            .map(|prev| point.price.pct_change_from(prev))
            .unwrap_or(Decimal::ZERO);
        prev_price = Some(point.price);

        ticks.push(IndicatorTick {
            timestamp: point.timestamp,
            price: point.price,
            ema: next_ema,
            upper_band,
            lower_band,
            pct_change,
            signal,
        });
    }
    ticks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HedgeAction {
    Increase,
    Decrease,
    FlipOn,
    FlipOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderReason {
    SignalFlip,
    Redelta,
    SafetyNet,
}

impl fmt::Display for OrderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderReason::SignalFlip => write!(f, "signal flip"),
            OrderReason::Redelta => write!(f, "re-delta"),
            OrderReason::SafetyNet => write!(f, "safety net"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgeOrder {
    pub action: HedgeAction,
    pub target_size: Decimal,
    // target - current. positive = add short
    pub delta: Decimal,
    pub reason: OrderReason,
}

// 5.2: effective signal -> target -> order if flipping or drifted past threshold
pub fn decide_hedge_order<I, H>(
    tick: &IndicatorTick,
    inventory: &I,
    hedge: &H,
    params: &StrategyParams,
) -> Option<HedgeOrder>
where
    I: InventorySource + ?Sized,
    H: HedgeExposure + ?Sized,
{
    decide_for_sizes(tick, inventory.volatile_inventory(), hedge.hedge_size(), params)
}

pub fn decide_for_sizes(
    tick: &IndicatorTick,
    inventory_size: Decimal,
    current_size: Decimal,
    params: &StrategyParams,
) -> Option<HedgeOrder> {
    let mut signal = match params.hedge_mode {
        HedgeMode::Always => Signal::HedgeOn,
        HedgeMode::Trend => tick.signal,
    };

    let mut safety_triggered = false;
    if params.use_safety_net
        && signal == Signal::HedgeOff
        && tick.pct_change.abs() >= params.safety_net_pct
    {
        signal = Signal::HedgeOn;
        safety_triggered = true;
    }

    let target = match signal {
        Signal::HedgeOn => inventory_size.max(Decimal::ZERO),
        Signal::HedgeOff => Decimal::ZERO,
    };
    let current = current_size.max(Decimal::ZERO);
    let gap = (target - current).abs();
    if gap <= params.min_order_size {
        return None;
    }

    let flip_on = target > Decimal::ZERO && current.is_zero();
    let flip_off = target.is_zero() && current > Decimal::ZERO;

    let action = if flip_on {
        HedgeAction::FlipOn
    } else if flip_off {
        HedgeAction::FlipOff
    } else if target.is_zero() {
        // flat and staying flat
        return None;
    } else {
        let drift_ratio = gap / target;
        if drift_ratio <= params.hedge_threshold {
            return None;
        }
        if target > current {
            HedgeAction::Increase
        } else {
            HedgeAction::Decrease
        }
    };

    let reason = if safety_triggered {
        OrderReason::SafetyNet
    } else if flip_on || flip_off {
        OrderReason::SignalFlip
    } else {
        OrderReason::Redelta
    };

    Some(HedgeOrder {
        action,
        target_size: target,
        delta: target - current,
        reason,
    })
}
