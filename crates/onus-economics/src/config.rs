//! Engine configuration types
//!
//! Every policy constant of the engine lives here so deployments can tune the
//! feedback loop from a single TOML file. All sections default to the values
//! the network launched with.

use crate::error::{EconomicsError, Result};
use crate::types::{TokenAmount, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_YEAR};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EconomicsConfig {
    /// Congestion classification
    #[serde(default)]
    pub network: NetworkConfig,

    /// Content decay parameters
    #[serde(default)]
    pub decay: DecayConfig,

    /// Stake pool parameters
    #[serde(default)]
    pub pools: PoolConfig,

    /// Tax policy parameters
    #[serde(default)]
    pub tax: TaxConfig,

    /// Reward rates and bonus thresholds
    #[serde(default)]
    pub rewards: RewardConfig,

    /// Periodic task intervals
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EconomicsConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check ordering and range rules across all sections
    pub fn validate(&self) -> Result<()> {
        self.network.congestion.validate()?;
        self.decay.validate()?;

        if self.network.message_capacity == 0 {
            return Err(EconomicsError::InvalidConfig(
                "network.message_capacity must be > 0".into(),
            ));
        }
        if self.pools.multiplier_threshold == 0 {
            return Err(EconomicsError::InvalidConfig(
                "pools.multiplier_threshold must be > 0".into(),
            ));
        }
        if self.pools.max_participants == 0 {
            return Err(EconomicsError::InvalidConfig(
                "pools.max_participants must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tax.base_rate) || self.tax.max_rate < self.tax.base_rate {
            return Err(EconomicsError::InvalidConfig(
                "tax.base_rate must be in [0, 1] and not exceed tax.max_rate".into(),
            ));
        }
        if self.tax.stake_reference == 0 {
            return Err(EconomicsError::InvalidConfig(
                "tax.stake_reference must be > 0".into(),
            ));
        }
        if self.rewards.min_rate_factor > 1.0 || self.rewards.max_rate_factor < 1.0 {
            return Err(EconomicsError::InvalidConfig(
                "rewards rate factors must bracket 1.0".into(),
            ));
        }
        if self.rewards.unhealthy_band >= self.rewards.healthy_band {
            return Err(EconomicsError::InvalidConfig(
                "rewards.unhealthy_band must be below rewards.healthy_band".into(),
            ));
        }
        self.scheduler.validate()
    }
}

/// Message-volume ratio thresholds for congestion classification
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CongestionThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for CongestionThresholds {
    fn default() -> Self {
        Self {
            low: 0.3,
            medium: 0.6,
            high: 0.8,
            critical: 0.95,
        }
    }
}

impl CongestionThresholds {
    fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.low
            && self.low <= self.medium
            && self.medium <= self.high
            && self.high <= self.critical;
        if ordered {
            Ok(())
        } else {
            Err(EconomicsError::InvalidConfig(
                "congestion thresholds must satisfy 0 <= low <= medium <= high <= critical".into(),
            ))
        }
    }
}

/// Network observation settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Message volume the relay network is provisioned for
    #[serde(default = "default_message_capacity")]
    pub message_capacity: u64,

    /// Number of health samples retained (one per sampling interval)
    #[serde(default = "default_health_history_len")]
    pub health_history_len: usize,

    /// Congestion thresholds on message_volume / message_capacity
    #[serde(default)]
    pub congestion: CongestionThresholds,
}

fn default_message_capacity() -> u64 {
    10_000
}

fn default_health_history_len() -> usize {
    24 * 60 // one day of per-minute samples
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            message_capacity: default_message_capacity(),
            health_history_len: default_health_history_len(),
            congestion: CongestionThresholds::default(),
        }
    }
}

/// Base decay rates in score points (percent) per hour
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BaseDecayRates {
    pub post: f64,
    pub comment: f64,
    pub stake: f64,
    pub node: f64,
}

impl Default for BaseDecayRates {
    fn default() -> Self {
        Self {
            post: 2.5,
            comment: 3.0,
            stake: 1.0,
            node: 0.5,
        }
    }
}

/// Quality score bands (0-100)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QualityThresholds {
    /// At or above: excellent
    pub excellent: f64,
    /// At or above: good
    pub good: f64,
    /// Strictly below: accelerates decay
    pub fair: f64,
    /// At or below: poor
    pub poor: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: 85.0,
            good: 70.0,
            fair: 50.0,
            poor: 40.0,
        }
    }
}

/// Decay engine parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecayConfig {
    /// Share of a fully decayed stake diverted to the treasury
    pub treasury_tax_rate: f64,
    /// Minimum acceleration change that is recorded in history
    pub acceleration_event_threshold: f64,
    /// Upper clamp on any computed acceleration factor
    pub max_acceleration: f64,
    /// Acceleration history ring-buffer capacity
    pub history_capacity: usize,
    /// How far out preservation pushes expiry
    pub preservation_period_secs: i64,
    /// Smallest stake accepted on registration
    pub min_stake: TokenAmount,
    /// Largest stake accepted on registration
    pub max_stake: TokenAmount,
    pub base_rates: BaseDecayRates,
    pub quality: QualityThresholds,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            treasury_tax_rate: 0.10,
            acceleration_event_threshold: 0.1,
            max_acceleration: 25.0,
            history_capacity: 1000,
            preservation_period_secs: SECONDS_PER_YEAR,
            min_stake: 1,
            max_stake: 1_000_000_000,
            base_rates: BaseDecayRates::default(),
            quality: QualityThresholds::default(),
        }
    }
}

impl DecayConfig {
    fn validate(&self) -> Result<()> {
        let q = &self.quality;
        if !(q.poor <= q.fair && q.fair <= q.good && q.good <= q.excellent) {
            return Err(EconomicsError::InvalidConfig(
                "quality thresholds must satisfy poor <= fair <= good <= excellent".into(),
            ));
        }
        let rates = &self.base_rates;
        if [rates.post, rates.comment, rates.stake, rates.node]
            .iter()
            .any(|r| *r <= 0.0)
        {
            return Err(EconomicsError::InvalidConfig(
                "base decay rates must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.treasury_tax_rate) {
            return Err(EconomicsError::InvalidConfig(
                "decay.treasury_tax_rate must be in [0, 1]".into(),
            ));
        }
        if self.history_capacity == 0 || self.max_acceleration <= 0.0 {
            return Err(EconomicsError::InvalidConfig(
                "decay.history_capacity and decay.max_acceleration must be > 0".into(),
            ));
        }
        if self.min_stake == 0 || self.min_stake > self.max_stake {
            return Err(EconomicsError::InvalidConfig(
                "decay stake bounds must satisfy 0 < min_stake <= max_stake".into(),
            ));
        }
        Ok(())
    }
}

/// Stake pool parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool size below which no multiplier applies
    pub multiplier_threshold: TokenAmount,
    /// Multiplier gained per decade of pool size above the threshold
    pub curve_slope: f64,
    /// Participant cap per pool
    pub max_participants: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            multiplier_threshold: 1_000,
            curve_slope: 0.2,
            max_participants: 100,
        }
    }
}

/// Tax policy parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaxConfig {
    pub base_rate: f64,
    /// Added in full when network health is 0
    pub health_adjustment: f64,
    /// Added in full when the user's stake reaches `stake_reference`
    pub stake_adjustment: f64,
    pub stake_reference: TokenAmount,
    pub max_rate: f64,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.15,
            health_adjustment: 0.10,
            stake_adjustment: 0.05,
            stake_reference: 10_000,
            max_rate: 0.30,
        }
    }
}

/// Reward rates, bonus thresholds and daily adjustment bounds
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewardConfig {
    /// Tokens per hour of node operation at 100% uptime
    pub base_node_reward: f64,
    /// Annual staking yield (0.08 = 8%)
    pub staking_apy: f64,
    /// Uptime factor ceiling (uptime / 100 is clamped to this)
    pub max_uptime_factor: f64,

    pub performance_bonus_threshold: f64,
    /// Fraction of base_node_reward paid as performance bonus
    pub performance_bonus_factor: f64,

    pub network_bonus_min_health: f64,
    pub network_bonus_min_uptime: f64,
    /// Fraction of base_node_reward paid as network bonus
    pub network_bonus_factor: f64,

    /// Pools at or above this multiplier qualify for the pool bonus
    pub pool_bonus_min_multiplier: f64,
    /// Fraction of the pool participation reward paid as pool bonus
    pub pool_bonus_factor: f64,

    /// Relative step of the daily reward-rate adjustment
    pub adjustment_step: f64,
    /// Health at or above which rates are nudged up
    pub healthy_band: f64,
    /// Health below which rates are nudged down
    pub unhealthy_band: f64,
    /// Floor for adjusted rates relative to the configured base
    pub min_rate_factor: f64,
    /// Ceiling for adjusted rates relative to the configured base
    pub max_rate_factor: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            base_node_reward: 10.0,
            staking_apy: 0.08,
            max_uptime_factor: 1.5,
            performance_bonus_threshold: 1.2,
            performance_bonus_factor: 0.5,
            network_bonus_min_health: 80.0,
            network_bonus_min_uptime: 95.0,
            network_bonus_factor: 0.25,
            pool_bonus_min_multiplier: 1.1,
            pool_bonus_factor: 0.1,
            adjustment_step: 0.10,
            healthy_band: 80.0,
            unhealthy_band: 50.0,
            min_rate_factor: 0.5,
            max_rate_factor: 2.0,
        }
    }
}

/// Periodic task intervals in seconds
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub health_sample_secs: i64,
    pub decay_tick_secs: i64,
    pub payout_cycle_secs: i64,
    pub maintenance_secs: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            health_sample_secs: 60,
            decay_tick_secs: 60,
            payout_cycle_secs: SECONDS_PER_HOUR,
            maintenance_secs: SECONDS_PER_DAY,
        }
    }
}

impl SchedulerConfig {
    fn validate(&self) -> Result<()> {
        if [
            self.health_sample_secs,
            self.decay_tick_secs,
            self.payout_cycle_secs,
            self.maintenance_secs,
        ]
        .iter()
        .any(|s| *s <= 0)
        {
            return Err(EconomicsError::InvalidConfig(
                "scheduler intervals must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
