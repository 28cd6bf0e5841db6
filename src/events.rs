// 11.0: every discrete thing the engine does produces an event. used for audit trails and the run summary.
// EventPayload lists the structured events, EventTag is the short label that lands in the output table.

use crate::strategy::{HedgeAction, OrderReason};
use crate::types::{Price, Quote, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }

    pub fn tag(&self) -> EventTag {
        self.payload.tag()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // LP events
    LpRebalanced(LpRebalancedEvent),

    // Hedge events
    HedgeAdjusted(HedgeAdjustedEvent),
    SafetyNet(SafetyNetEvent),
    MarginCallRejected(MarginCallRejectedEvent),
    OrderFailed(OrderFailedEvent),
    EmergencyRescue(EmergencyRescueEvent),
    FundingSettled(FundingSettledEvent),

    // Capital events
    CrossSweep(CrossSweepEvent),
    Harvest(HarvestEvent),
}

impl EventPayload {
    pub fn tag(&self) -> EventTag {
        match self {
            EventPayload::LpRebalanced(_) => EventTag::LpRebalance,
            EventPayload::HedgeAdjusted(_) => EventTag::AdjustHedge,
            EventPayload::SafetyNet(_) => EventTag::SafetyNet,
            EventPayload::MarginCallRejected(_) => EventTag::MarginCallReject,
            EventPayload::OrderFailed(_) => EventTag::OrderFailed,
            EventPayload::EmergencyRescue(_) => EventTag::EmergencyRescue,
            EventPayload::FundingSettled(_) => EventTag::Funding,
            EventPayload::CrossSweep(_) => EventTag::CrossSweep,
            EventPayload::Harvest(_) => EventTag::Harvest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpRebalancedEvent {
    pub price: Price,
    pub new_lower: Price,
    pub new_upper: Price,
    pub gas_cost: Quote,
    pub slippage_cost: Quote,
    // true when price left the range rather than drifting
    pub forced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeAdjustedEvent {
    pub action: HedgeAction,
    pub reason: OrderReason,
    pub old_size: Decimal,
    pub new_size: Decimal,
    pub price: Price,
    pub fee: Quote,
    pub realized_pnl: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyNetEvent {
    pub pct_change: Decimal,
    pub target_size: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginCallRejectedEvent {
    pub requested_size: Decimal,
    pub required: Quote,
    pub available: Quote,
}

// any other hedge-book refusal. the tick carries on without the fill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFailedEvent {
    pub requested_size: Decimal,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRescueEvent {
    pub deficit: Quote,
    // lp profit the cap was taken from
    pub accumulated_profit_before: Quote,
    pub transferred: Quote,
    pub lp_value_after: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSettledEvent {
    pub funding_rate: Decimal,
    pub payment: Quote,
    pub hedge_size: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepDirection {
    LpToExchange,
    ExchangeToLp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossSweepEvent {
    pub direction: SweepDirection,
    pub amount: Quote,
    pub lp_ratio_before: Decimal,
    pub target_ratio: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestEvent {
    pub amount: Quote,
    pub total_withdrawn: Quote,
}

// 11.1: table labels. Display/FromStr use the upper snake names written to csv
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventTag {
    LpRebalance,
    AdjustHedge,
    SafetyNet,
    MarginCallReject,
    OrderFailed,
    EmergencyRescue,
    Funding,
    CrossSweep,
    Harvest,
}

impl EventTag {
    pub const ALL: [EventTag; 9] = [
        EventTag::LpRebalance,
        EventTag::AdjustHedge,
        EventTag::SafetyNet,
        EventTag::MarginCallReject,
        EventTag::OrderFailed,
        EventTag::EmergencyRescue,
        EventTag::Funding,
        EventTag::CrossSweep,
        EventTag::Harvest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventTag::LpRebalance => "LP_REBALANCE",
            EventTag::AdjustHedge => "ADJUST_HEDGE",
            EventTag::SafetyNet => "SAFETY_NET",
            EventTag::MarginCallReject => "MARGIN_CALL_REJECT",
            EventTag::OrderFailed => "ORDER_FAILED",
            EventTag::EmergencyRescue => "EMERGENCY_RESCUE",
            EventTag::Funding => "FUNDING",
            EventTag::CrossSweep => "CROSS_SWEEP",
            EventTag::Harvest => "HARVEST",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event tag {0:?}")]
pub struct UnknownEventTag(pub String);

impl FromStr for EventTag {
    type Err = UnknownEventTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| UnknownEventTag(s.to_string()))
    }
}
