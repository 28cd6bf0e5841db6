// 7.0 config.rs: all backtest settings in one place. lp, hedge, strategy, capital, timing, capital moves.
// parsed once from toml at the load boundary, then validate() rejects anything the engine can't run.
// 7.1 sections, 7.2 presets, 7.3 validation.

use crate::funding::FundingSchedule;
use crate::liquidity::LpParams;
use crate::position::HedgeParams;
use crate::strategy::StrategyParams;
use crate::types::Quote;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// Starting capital per venue. the lp gets lp_capital, the exchange wallet gets exchange_capital
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalConfig {
    pub lp_capital: Quote,
    pub exchange_capital: Quote,
}

impl Default for CapitalConfig {
    fn default() -> Self {
        Self {
            lp_capital: Quote::new(dec!(10000)),
            exchange_capital: Quote::new(dec!(5000)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    // minutes between decisions. one price tick per interval
    pub interval_minutes: u32,
    // positive = longs pay shorts
    pub funding_rate_per_8h: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            funding_rate_per_8h: dec!(0.0001),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub enabled: bool,
    pub frequency_days: u32,
    // fixed amount taken out of lp profit each cycle
    pub withdrawal_target: Quote,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency_days: 30,
            withdrawal_target: Quote::new(dec!(100)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossMarginConfig {
    pub enabled: bool,
    pub frequency_days: u32,
    // lp share of (lp + wallet). None = the starting split
    pub target_ratio: Option<Decimal>,
    // gap (as a share of the total) that must be exceeded before moving cash
    pub min_deviation: Decimal,
    // share of the gap moved per sweep
    pub transfer_fraction: Decimal,
}

impl Default for CrossMarginConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency_days: 7,
            target_ratio: None,
            min_deviation: dec!(0.05),
            transfer_fraction: dec!(0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescueBasisPolicy {
    // rescue only lowers market value, cost basis keeps the original deposit
    MarketValueOnly,
    // rescue also lowers cost basis, so later harvests don't count it as profit loss
    ReduceCostBasis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RescueConfig {
    pub enabled: bool,
    // extra transferred on top of the deficit, as a share of the deficit
    pub buffer_fraction: Decimal,
    // cap as a share of the lp's accumulated fee profit
    pub max_profit_fraction: Decimal,
    pub basis_policy: RescueBasisPolicy,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_fraction: dec!(0.5),
            max_profit_fraction: dec!(0.8),
            basis_policy: RescueBasisPolicy::MarketValueOnly,
        }
    }
}

/// Everything a single backtest run needs apart from the price series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub lp: LpParams,
    pub hedge: HedgeParams,
    pub strategy: StrategyParams,
    pub capital: CapitalConfig,
    pub execution: ExecutionConfig,
    pub harvesting: HarvestConfig,
    pub cross_margin: CrossMarginConfig,
    pub rescue: RescueConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid lp config: {reason}")]
    InvalidLp { reason: String },

    #[error("invalid hedge config: {reason}")]
    InvalidHedge { reason: String },

    #[error("invalid strategy config: {reason}")]
    InvalidStrategy { reason: String },

    #[error("invalid capital config: {reason}")]
    InvalidCapital { reason: String },

    #[error("invalid execution config: {reason}")]
    InvalidExecution { reason: String },

    #[error("invalid capital movement config: {reason}")]
    InvalidCapitalMovement { reason: String },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

fn fraction_in(value: Decimal, low: Decimal, high: Decimal) -> bool {
    value > low && value < high
}

impl BacktestConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    // 7.2: wider range, tighter hedge, deeper margin buffer
    pub fn conservative() -> Self {
        let mut config = Self::default();
        config.lp.range_width = dec!(0.20);
        config.lp.rebalance_threshold = dec!(0.25);
        config.strategy.hedge_mode = crate::strategy::HedgeMode::Always;
        config.strategy.hedge_threshold = dec!(0.03);
        config.capital.exchange_capital = Quote::new(dec!(10000));
        config.cross_margin.enabled = true;
        config.rescue.max_profit_fraction = dec!(0.5);
        config
    }

    // narrow range for more fee, leveraged hedge, trend following
    pub fn aggressive() -> Self {
        let mut config = Self::default();
        config.lp.range_width = dec!(0.05);
        config.lp.rebalance_threshold = dec!(0.30);
        config.hedge.leverage = crate::types::Leverage::new(dec!(3)).unwrap_or(config.hedge.leverage);
        config.strategy.hedge_threshold = dec!(0.10);
        config.capital.exchange_capital = Quote::new(dec!(3000));
        config.harvesting.enabled = true;
        config.rescue.max_profit_fraction = dec!(1.2);
        config
    }

    pub fn initial_capital(&self) -> Quote {
        self.capital.lp_capital.add(self.capital.exchange_capital)
    }

    pub fn schedule(&self) -> FundingSchedule {
        FundingSchedule::new(self.execution.interval_minutes)
    }

    // lp share the sweep steers toward
    pub fn sweep_target_ratio(&self) -> Decimal {
        if let Some(ratio) = self.cross_margin.target_ratio {
            return ratio;
        }
        let total = self.initial_capital().value();
        if total.is_zero() {
            return Decimal::ZERO;
        }
        self.capital.lp_capital.value() / total
    }

    // 7.3: everything the engine divides by or sizes from must be sane
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !fraction_in(self.lp.range_width, Decimal::ZERO, Decimal::ONE) {
            return Err(ConfigError::InvalidLp {
                reason: format!("range_width {} must be between 0 and 1", self.lp.range_width),
            });
        }
        if self.lp.rebalance_threshold <= Decimal::ZERO || self.lp.rebalance_threshold > dec!(0.5) {
            return Err(ConfigError::InvalidLp {
                reason: "rebalance_threshold must be in (0, 0.5]".to_string(),
            });
        }
        if self.lp.yield_rate.is_sign_negative() || self.lp.slippage_rate.is_sign_negative() || self.lp.gas_cost.is_negative() {
            return Err(ConfigError::InvalidLp {
                reason: "yield, gas and slippage must be non-negative".to_string(),
            });
        }

        if self.hedge.leverage.value() <= Decimal::ZERO {
            return Err(ConfigError::InvalidHedge {
                reason: "leverage must be positive".to_string(),
            });
        }
        if self.hedge.taker_fee_rate.is_sign_negative() || self.hedge.taker_fee_rate >= dec!(0.01) {
            return Err(ConfigError::InvalidHedge {
                reason: "taker fee must be in [0, 1%)".to_string(),
            });
        }

        if self.strategy.hedge_threshold.is_sign_negative() || self.strategy.safety_net_pct <= Decimal::ZERO {
            return Err(ConfigError::InvalidStrategy {
                reason: "hedge_threshold must be >= 0 and safety_net_pct > 0".to_string(),
            });
        }
        if self.strategy.min_order_size.is_sign_negative() {
            return Err(ConfigError::InvalidStrategy {
                reason: format!("min_order_size {} must be non-negative", self.strategy.min_order_size),
            });
        }
        if self.strategy.ema_period == 0 {
            return Err(ConfigError::InvalidStrategy {
                reason: "ema_period must be at least 1".to_string(),
            });
        }
        if self.strategy.hysteresis_band_pct.is_sign_negative() || self.strategy.hysteresis_band_pct >= Decimal::ONE {
            return Err(ConfigError::InvalidStrategy {
                reason: "hysteresis_band_pct must be in [0, 1)".to_string(),
            });
        }

        if !self.capital.lp_capital.is_positive() {
            return Err(ConfigError::InvalidCapital {
                reason: format!("lp_capital {} must be positive", self.capital.lp_capital),
            });
        }
        if self.capital.exchange_capital.is_negative() {
            return Err(ConfigError::InvalidCapital {
                reason: "exchange_capital must be non-negative".to_string(),
            });
        }

        if self.execution.interval_minutes == 0 {
            return Err(ConfigError::InvalidExecution {
                reason: "interval_minutes must be at least 1".to_string(),
            });
        }

        if self.harvesting.enabled && (self.harvesting.frequency_days == 0 || !self.harvesting.withdrawal_target.is_positive()) {
            return Err(ConfigError::InvalidCapitalMovement {
                reason: "harvesting needs a frequency and a positive withdrawal target".to_string(),
            });
        }
        if self.cross_margin.enabled {
            if self.cross_margin.frequency_days == 0 {
                return Err(ConfigError::InvalidCapitalMovement {
                    reason: "cross margin frequency_days must be at least 1".to_string(),
                });
            }
            if let Some(ratio) = self.cross_margin.target_ratio {
                if !fraction_in(ratio, Decimal::ZERO, Decimal::ONE) {
                    return Err(ConfigError::InvalidCapitalMovement {
                        reason: format!("target_ratio {} must be between 0 and 1", ratio),
                    });
                }
            }
            if self.cross_margin.transfer_fraction <= Decimal::ZERO || self.cross_margin.transfer_fraction > Decimal::ONE {
                return Err(ConfigError::InvalidCapitalMovement {
                    reason: "transfer_fraction must be in (0, 1]".to_string(),
                });
            }
        }
        if self.rescue.buffer_fraction.is_sign_negative() || self.rescue.max_profit_fraction.is_sign_negative() {
            return Err(ConfigError::InvalidCapitalMovement {
                reason: "rescue fractions must be non-negative".to_string(),
            });
        }

        Ok(())
    }
}
