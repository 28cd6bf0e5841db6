// 9.0 price_feed.rs: where the close series comes from. the engine only ever sees Vec<PricePoint>,
// built before the run starts. synthetic gbm paths, csv candles, or a plain list of closes.
// 9.1 gbm generator, 9.2 csv loader.

use crate::funding::MINUTES_PER_YEAR;
use crate::types::{Price, Timestamp};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::io::Read;

const PRICE_DECIMALS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: Timestamp,
    pub price: Price,
}

#[derive(Debug, thiserror::Error)]
pub enum PriceFeedError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing column {0}")]
    MissingColumn(&'static str),

    #[error("row {row}: bad timestamp {value:?}")]
    InvalidTimestamp { row: usize, value: String },

    #[error("row {row}: bad price {value:?}")]
    InvalidPrice { row: usize, value: String },

    #[error("invalid generator config: {0}")]
    InvalidConfig(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmConfig {
    pub start_price: Decimal,
    pub days: u32,
    pub annual_volatility: f64,
    pub annual_drift: f64,
    pub seed: u64,
    pub interval_minutes: u32,
    pub start_time: Timestamp,
}

impl Default for GbmConfig {
    fn default() -> Self {
        Self {
            start_price: dec!(2000),
            days: 30,
            annual_volatility: 0.80,
            annual_drift: 0.0,
            seed: 42,
            interval_minutes: 60,
            // 2024-01-01 00:00 UTC
            start_time: Timestamp::from_millis(1_704_067_200_000),
        }
    }
}

// 9.1: minute-level exact log-return discretisation, then each interval keeps its last minute
pub fn generate_gbm(config: &GbmConfig) -> Result<Vec<PricePoint>, PriceFeedError> {
    if config.start_price <= Decimal::ZERO {
        return Err(PriceFeedError::InvalidConfig("start price must be positive"));
    }
    if config.interval_minutes == 0 || config.days == 0 {
        return Err(PriceFeedError::InvalidConfig("days and interval must be non-zero"));
    }
    if !config.annual_volatility.is_finite() || config.annual_volatility < 0.0 {
        return Err(PriceFeedError::InvalidConfig("volatility must be finite and >= 0"));
    }

    let start = config
        .start_price
        .to_f64()
        .ok_or(PriceFeedError::InvalidConfig("start price not representable"))?;
    let total_minutes = config.days as usize * 24 * 60;
    let dt = 1.0 / f64::from(MINUTES_PER_YEAR);
    let sigma = config.annual_volatility;
    let drift = (config.annual_drift - sigma * sigma / 2.0) * dt;
    let shock_scale = sigma * dt.sqrt();

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut path = Vec::with_capacity(total_minutes + 1);
    let mut log_price = 0.0_f64;
    path.push(start);
    for _ in 0..total_minutes {
        let z: f64 = StandardNormal.sample(&mut rng);
        log_price += drift + shock_scale * z;
        path.push(start * log_price.exp());
    }

    let interval = config.interval_minutes as usize;
    let mut points = Vec::with_capacity(total_minutes / interval + 1);
    let mut bucket = 0;
    while bucket <= total_minutes {
        let close_idx = (bucket + interval - 1).min(total_minutes);
        points.push(PricePoint {
            timestamp: config.start_time.plus_minutes(bucket as i64),
            price: to_price(path[close_idx], points.len())?,
        });
        bucket += interval;
    }
    Ok(points)
}

// a path that overflows or collapses to zero is an error, never a gap in the series
fn to_price(value: f64, row: usize) -> Result<Price, PriceFeedError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(PRICE_DECIMALS))
        .and_then(Price::new)
        .ok_or_else(|| PriceFeedError::InvalidPrice {
            row,
            value: value.to_string(),
        })
}

pub fn from_closes(start: Timestamp, interval_minutes: u32, closes: &[Decimal]) -> Vec<PricePoint> {
    closes
        .iter()
        .enumerate()
        .filter_map(|(i, close)| {
            Price::new(*close).map(|price| PricePoint {
                timestamp: start.plus_minutes(i as i64 * interval_minutes as i64),
                price,
            })
        })
        .collect()
}

// 9.2: header row required. needs a timestamp/date column and a close column, anything else is ignored
pub fn load_csv<R: Read>(reader: R) -> Result<Vec<PricePoint>, PriceFeedError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let ts_col = find_column(&headers, &["timestamp", "date", "time"])
        .ok_or(PriceFeedError::MissingColumn("timestamp"))?;
    let close_col =
        find_column(&headers, &["close", "price"]).ok_or(PriceFeedError::MissingColumn("close"))?;

    let mut points = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let row = idx + 1;
        let raw_ts = record.get(ts_col).unwrap_or_default().trim();
        let raw_close = record.get(close_col).unwrap_or_default().trim();

        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| PriceFeedError::InvalidTimestamp {
            row,
            value: raw_ts.to_string(),
        })?;
        let price = raw_close
            .parse::<Decimal>()
            .ok()
            .and_then(Price::new)
            .ok_or_else(|| PriceFeedError::InvalidPrice {
                row,
                value: raw_close.to_string(),
            })?;
        points.push(PricePoint { timestamp, price });
    }
    Ok(points)
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

// epoch millis, rfc3339, or naive "YYYY-MM-DD HH:MM[:SS]" read as utc
fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(Timestamp::from_millis(ms));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Timestamp::from_datetime(dt.with_timezone(&Utc)));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Timestamp::from_datetime(Utc.from_utc_datetime(&naive)))
}
