// 14.0: csv export/import of the run table and ledger totals.
// decimals are written as exact strings, so reading a file back reproduces every value bit for bit.
// event tags share one column, joined by '|'.

use crate::events::{EventTag, UnknownEventTag};
use crate::ledger::{SimulationState, TransactionCategory, UnknownCategory};
use crate::types::{Price, Quote, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use thiserror::Error;

const TAG_SEPARATOR: char = '|';

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tag(#[from] UnknownEventTag),

    #[error(transparent)]
    Category(#[from] UnknownCategory),

    #[error("row {row}: non-positive price {value}")]
    InvalidPrice { row: usize, value: Decimal },
}

// one line of the per-tick table
#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    timestamp: i64,
    time: String,
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    net_equity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    wallet_balance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    available_margin: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    lp_value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    hedge_unrealized_pnl: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    lp_inventory: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    hedge_size: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    residual_delta: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    cumulative_fees: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    cumulative_costs: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    total_withdrawn: Decimal,
    tags: String,
}

impl From<&SimulationState> for StateRecord {
    fn from(state: &SimulationState) -> Self {
        Self {
            timestamp: state.timestamp.as_millis(),
            time: state.timestamp.to_string(),
            price: state.price.value(),
            net_equity: state.net_equity.value(),
            wallet_balance: state.wallet_balance.value(),
            available_margin: state.available_margin.value(),
            lp_value: state.lp_value.value(),
            hedge_unrealized_pnl: state.hedge_unrealized_pnl.value(),
            lp_inventory: state.lp_inventory,
            hedge_size: state.hedge_size,
            residual_delta: state.residual_delta,
            cumulative_fees: state.cumulative_fees.value(),
            cumulative_costs: state.cumulative_costs.value(),
            total_withdrawn: state.total_withdrawn.value(),
            tags: join_tags(&state.tags),
        }
    }
}

impl StateRecord {
    fn into_state(self, row: usize) -> Result<SimulationState, ReportError> {
        let price = Price::new(self.price).ok_or(ReportError::InvalidPrice {
            row,
            value: self.price,
        })?;
        Ok(SimulationState {
            timestamp: Timestamp::from_millis(self.timestamp),
            price,
            net_equity: Quote::new(self.net_equity),
            wallet_balance: Quote::new(self.wallet_balance),
            available_margin: Quote::new(self.available_margin),
            lp_value: Quote::new(self.lp_value),
            hedge_unrealized_pnl: Quote::new(self.hedge_unrealized_pnl),
            lp_inventory: self.lp_inventory,
            hedge_size: self.hedge_size,
            residual_delta: self.residual_delta,
            cumulative_fees: Quote::new(self.cumulative_fees),
            cumulative_costs: Quote::new(self.cumulative_costs),
            total_withdrawn: Quote::new(self.total_withdrawn),
            tags: split_tags(&self.tags)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TotalRecord {
    category: String,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
}

pub fn join_tags(tags: &[EventTag]) -> String {
    tags.iter()
        .map(EventTag::as_str)
        .collect::<Vec<_>>()
        .join(&TAG_SEPARATOR.to_string())
}

pub fn split_tags(column: &str) -> Result<Vec<EventTag>, UnknownEventTag> {
    column
        .split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

// 14.1: per-tick table
pub fn write_states<W: Write>(writer: W, states: &[SimulationState]) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for state in states {
        wtr.serialize(StateRecord::from(state))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_states<R: Read>(reader: R) -> Result<Vec<SimulationState>, ReportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<StateRecord>()
        .enumerate()
        .map(|(row, record)| record?.into_state(row + 1))
        .collect()
}

// 14.2: ledger category totals, one row per category in enum order
pub fn write_ledger_totals<W: Write>(
    writer: W,
    totals: &BTreeMap<TransactionCategory, Quote>,
) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (category, amount) in totals {
        wtr.serialize(TotalRecord {
            category: category.as_str().to_string(),
            amount: amount.value(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_ledger_totals<R: Read>(reader: R) -> Result<BTreeMap<TransactionCategory, Quote>, ReportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut totals = BTreeMap::new();
    for record in rdr.deserialize::<TotalRecord>() {
        let record = record?;
        let category: TransactionCategory = record.category.parse()?;
        totals.insert(category, Quote::new(record.amount));
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_state(tags: Vec<EventTag>) -> SimulationState {
        SimulationState {
            timestamp: Timestamp::from_millis(1_704_067_200_000),
            price: Price::new_unchecked(dec!(2000.123456789)),
            net_equity: Quote::new(dec!(15012.000000000000000001)),
            wallet_balance: Quote::new(dec!(4998.9)),
            available_margin: Quote::new(dec!(2498.9)),
            lp_value: Quote::new(dec!(10013.1)),
            hedge_unrealized_pnl: Quote::new(dec!(0)),
            lp_inventory: dec!(2.5031),
            hedge_size: dec!(2.5),
            residual_delta: dec!(0.0031),
            cumulative_fees: Quote::new(dec!(13.1)),
            cumulative_costs: Quote::new(dec!(1.1)),
            total_withdrawn: Quote::zero(),
            tags,
        }
    }

    #[test]
    fn states_survive_csv() {
        let states = vec![
            sample_state(vec![]),
            sample_state(vec![EventTag::LpRebalance, EventTag::AdjustHedge]),
        ];
        let mut buf = Vec::new();
        write_states(&mut buf, &states).unwrap();
        let back = read_states(buf.as_slice()).unwrap();
        assert_eq!(back, states);
    }

    #[test]
    fn tags_column_format() {
        assert_eq!(join_tags(&[EventTag::EmergencyRescue, EventTag::MarginCallReject]), "EMERGENCY_RESCUE|MARGIN_CALL_REJECT");
        assert!(split_tags("").unwrap().is_empty());
        assert!(split_tags("LP_REBALANCE|NOPE").is_err());
    }

    #[test]
    fn totals_survive_csv() {
        let mut totals = BTreeMap::new();
        totals.insert(TransactionCategory::LpFee, Quote::new(dec!(12.345678901234)));
        totals.insert(TransactionCategory::HedgeFee, Quote::new(dec!(-3.5)));
        let mut buf = Vec::new();
        write_ledger_totals(&mut buf, &totals).unwrap();
        assert_eq!(read_ledger_totals(buf.as_slice()).unwrap(), totals);
    }

    #[test]
    fn bad_price_is_rejected() {
        let mut buf = Vec::new();
        write_states(&mut buf, &[sample_state(vec![])]).unwrap();
        let text = String::from_utf8(buf).unwrap().replace("2000.123456789", "-1");
        assert!(matches!(read_states(text.as_bytes()), Err(ReportError::InvalidPrice { row: 1, .. })));
    }
}
