//! # Payout Calculation
//!
//! Computes each user's per-cycle reward from node operation, staking, pool
//! participation and network contribution, then applies the [`TaxPolicy`].
//!
//! ## Reward Components
//!
//! | Component | Formula |
//! |-----------|---------|
//! | Node operation | base_node_reward * hours * min(uptime / 100, 1.5) * performance |
//! | Staking | total_staked * (apy / 365 / 24) * hours |
//! | Network contribution | base_node_reward * health / 100 * reputation / 100 |
//! | Pool participation | sum(stake_in_pool * (multiplier - 1) * apy / 365) |
//!
//! ## Bonuses
//!
//! | Bonus | Condition | Amount |
//! |-------|-----------|--------|
//! | Performance | performance_multiplier > 1.2 | 0.5 * base_node_reward |
//! | Network | health >= 80 and uptime >= 95 | 0.25 * base_node_reward |
//! | Pool | any pool multiplier >= 1.1 | 0.1 * pool participation |
//!
//! `base_reward` is the sum of all components and bonuses, and
//! `final_payout = base_reward - tax_deduction`.

use crate::config::RewardConfig;
use crate::error::{EconomicsError, Result};
use crate::pools::StakePoolRegistry;
use crate::tax::TaxPolicy;
use crate::types::{hours_between, Timestamp, TokenAmount, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// A locked stake held by a user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Position ID (content or pool the stake backs)
    pub id: String,

    /// Amount locked
    pub amount: TokenAmount,

    /// When the stake was placed
    pub staked_at: Timestamp,

    /// Lock expiry; `None` means open-ended
    pub expires_at: Option<Timestamp>,
}

impl StakePosition {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

/// Per-user economic state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserEconomicProfile {
    /// User ID
    pub user_id: UserId,

    /// Total tokens staked by the user
    pub total_staked: TokenAmount,

    /// Individual locked positions
    pub active_stakes: Vec<StakePosition>,

    /// Node uptime percentage
    pub node_uptime: f64,

    /// Reputation (0-100)
    pub reputation_score: f64,

    /// Lifetime net earnings
    pub total_earnings: f64,

    /// Time of the last payout
    pub last_payout: Timestamp,

    /// Operator performance multiplier
    pub performance_multiplier: f64,

    /// Tax rate applied at the last payout
    pub tax_rate: f64,
}

impl UserEconomicProfile {
    /// Fresh profile with no stake and neutral reputation
    pub fn new(user_id: &str, now: Timestamp) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_staked: 0,
            active_stakes: Vec::new(),
            node_uptime: 0.0,
            reputation_score: 50.0,
            total_earnings: 0.0,
            last_payout: now,
            performance_multiplier: 1.0,
            tax_rate: 0.0,
        }
    }
}

/// Partial profile update from the wallet/session layer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfileUpdate {
    pub total_staked: Option<TokenAmount>,
    pub node_uptime: Option<f64>,
    pub reputation_score: Option<f64>,
    pub performance_multiplier: Option<f64>,
    /// Positions appended to `active_stakes`; each adds to `total_staked`
    pub new_stakes: Vec<StakePosition>,
}

/// Reward components before bonuses
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PayoutBreakdown {
    pub node_operation: f64,
    pub staking: f64,
    pub network_contribution: f64,
    pub pool_participation: f64,
}

impl PayoutBreakdown {
    pub fn total(&self) -> f64 {
        self.node_operation + self.staking + self.network_contribution + self.pool_participation
    }
}

/// One user's payout for one cycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayoutCalculation {
    /// User ID
    pub user_id: UserId,

    /// Components plus bonuses
    pub base_reward: f64,

    pub performance_bonus: f64,
    pub network_bonus: f64,
    pub pool_bonus: f64,

    /// Rate applied to `base_reward`
    pub tax_rate: f64,

    pub tax_deduction: f64,

    /// Net amount handed to the ledger
    pub final_payout: f64,

    /// Hours covered by this payout
    pub hours_elapsed: f64,

    pub breakdown: PayoutBreakdown,

    /// Timestamp
    pub timestamp: Timestamp,
}

/// Totals for one payout cycle
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PayoutCycleSummary {
    /// Number of users paid
    pub users_paid: u64,

    /// Sum of base rewards
    pub total_base: f64,

    /// Sum of tax deductions
    pub total_tax: f64,

    /// Sum of final payouts
    pub total_final: f64,

    /// Average final payout
    pub avg_payout: f64,

    /// Timestamp
    pub timestamp: Timestamp,
}

/// Stakes released by expired-stake cleanup
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeCleanup {
    pub positions_removed: u64,
    pub amount_released: TokenAmount,
    pub users_affected: u64,
}

/// Current reward rates, nudged daily by network health
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardRates {
    /// Tokens per hour of node operation
    pub base_node_reward: f64,

    /// Annual staking yield
    pub staking_apy: f64,
}

impl RewardRates {
    pub fn from_config(config: &RewardConfig) -> Self {
        Self {
            base_node_reward: config.base_node_reward,
            staking_apy: config.staking_apy,
        }
    }

    /// Daily adjustment: up a step when healthy, down a step when unhealthy,
    /// bounded relative to the configured base. Returns whether rates moved.
    pub fn adjust_for_health(&mut self, network_health: f64, config: &RewardConfig) -> bool {
        let factor = if network_health >= config.healthy_band {
            1.0 + config.adjustment_step
        } else if network_health < config.unhealthy_band {
            1.0 - config.adjustment_step
        } else {
            return false;
        };

        let before = *self;
        self.base_node_reward = (self.base_node_reward * factor).clamp(
            config.base_node_reward * config.min_rate_factor,
            config.base_node_reward * config.max_rate_factor,
        );
        self.staking_apy = (self.staking_apy * factor).clamp(
            config.staking_apy * config.min_rate_factor,
            config.staking_apy * config.max_rate_factor,
        );
        before != *self
    }
}

/// Owner of user profiles and reward rates
#[derive(Debug)]
pub struct PayoutCalculator {
    /// User profiles
    profiles: HashMap<UserId, UserEconomicProfile>,

    /// Current rates
    rates: RewardRates,

    /// Reward policy
    config: RewardConfig,

    /// Tax policy
    tax: TaxPolicy,
}

impl PayoutCalculator {
    pub fn new(config: RewardConfig, tax: TaxPolicy) -> Self {
        Self {
            profiles: HashMap::new(),
            rates: RewardRates::from_config(&config),
            config,
            tax,
        }
    }

    pub fn rates(&self) -> RewardRates {
        self.rates
    }

    pub fn get_profile(&self, user_id: &str) -> Option<&UserEconomicProfile> {
        self.profiles.get(user_id)
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    /// Known user ids in stable order
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.profiles.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Merge a partial update, creating the profile on first sight.
    ///
    /// Negative and non-finite values are clamped to zero.
    pub fn update_user_profile(
        &mut self,
        user_id: &str,
        update: UserProfileUpdate,
        now: Timestamp,
    ) -> &UserEconomicProfile {
        let profile = self
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserEconomicProfile::new(user_id, now));

        if let Some(v) = update.total_staked {
            profile.total_staked = v;
        }
        if let Some(v) = update.node_uptime {
            profile.node_uptime = non_negative(v);
        }
        if let Some(v) = update.reputation_score {
            profile.reputation_score = non_negative(v).min(100.0);
        }
        if let Some(v) = update.performance_multiplier {
            profile.performance_multiplier = non_negative(v);
        }
        for stake in update.new_stakes {
            profile.total_staked = profile.total_staked.saturating_add(stake.amount);
            profile.active_stakes.push(stake);
        }

        profile
    }

    /// Compute and settle one user's payout since their last payout
    pub fn calculate_user_payout(
        &mut self,
        user_id: &str,
        network_health: f64,
        pools: &StakePoolRegistry,
        now: Timestamp,
    ) -> Result<PayoutCalculation> {
        let profile = self
            .profiles
            .get(user_id)
            .ok_or_else(|| EconomicsError::ProfileNotFound(user_id.to_string()))?;

        let health = if network_health.is_finite() {
            network_health.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let rates = self.rates;
        let config = &self.config;
        let hours = hours_between(profile.last_payout, now);

        let uptime_factor = (profile.node_uptime / 100.0).min(config.max_uptime_factor);
        let shares = pools.shares_for_user(user_id);

        let breakdown = PayoutBreakdown {
            node_operation: rates.base_node_reward
                * hours
                * uptime_factor
                * profile.performance_multiplier,
            staking: profile.total_staked as f64 * (rates.staking_apy / 365.0 / 24.0) * hours,
            network_contribution: rates.base_node_reward
                * (health / 100.0)
                * (profile.reputation_score / 100.0),
            pool_participation: shares
                .iter()
                .map(|s| s.stake as f64 * (s.pool_multiplier - 1.0) * (rates.staking_apy / 365.0))
                .sum(),
        };

        let performance_bonus = if profile.performance_multiplier > config.performance_bonus_threshold {
            rates.base_node_reward * config.performance_bonus_factor
        } else {
            0.0
        };
        let network_bonus = if health >= config.network_bonus_min_health
            && profile.node_uptime >= config.network_bonus_min_uptime
        {
            rates.base_node_reward * config.network_bonus_factor
        } else {
            0.0
        };
        let pool_bonus = if shares
            .iter()
            .any(|s| s.pool_multiplier >= config.pool_bonus_min_multiplier)
        {
            breakdown.pool_participation * config.pool_bonus_factor
        } else {
            0.0
        };

        let base_reward = breakdown.total() + performance_bonus + network_bonus + pool_bonus;
        let tax_rate = self.tax.calculate_user_tax_rate(profile, health);
        let tax_deduction = base_reward * tax_rate;
        let final_payout = (base_reward - tax_deduction).max(0.0);

        let payout = PayoutCalculation {
            user_id: user_id.to_string(),
            base_reward,
            performance_bonus,
            network_bonus,
            pool_bonus,
            tax_rate,
            tax_deduction,
            final_payout,
            hours_elapsed: hours,
            breakdown,
            timestamp: now,
        };

        if let Some(profile) = self.profiles.get_mut(user_id) {
            profile.total_earnings += final_payout;
            profile.last_payout = now.max(profile.last_payout);
            profile.tax_rate = tax_rate;
        }

        debug!(
            user_id = %user_id,
            base = base_reward,
            tax = tax_deduction,
            payout = final_payout,
            "payout calculated"
        );
        Ok(payout)
    }

    /// Pay every known user and summarize the cycle
    pub fn run_payout_cycle(
        &mut self,
        network_health: f64,
        pools: &StakePoolRegistry,
        now: Timestamp,
    ) -> (Vec<PayoutCalculation>, PayoutCycleSummary) {
        let mut payouts = Vec::new();
        for user_id in self.user_ids() {
            if let Ok(payout) = self.calculate_user_payout(&user_id, network_health, pools, now) {
                payouts.push(payout);
            }
        }

        let mut summary = PayoutCycleSummary {
            users_paid: payouts.len() as u64,
            timestamp: now,
            ..PayoutCycleSummary::default()
        };
        for p in &payouts {
            summary.total_base += p.base_reward;
            summary.total_tax += p.tax_deduction;
            summary.total_final += p.final_payout;
        }
        if summary.users_paid > 0 {
            summary.avg_payout = summary.total_final / summary.users_paid as f64;
        }

        info!(
            users = summary.users_paid,
            total = summary.total_final,
            tax = summary.total_tax,
            "payout cycle complete"
        );
        (payouts, summary)
    }

    /// Drop stake positions whose lock has expired
    pub fn cleanup_expired_stakes(&mut self, now: Timestamp) -> StakeCleanup {
        let mut cleanup = StakeCleanup::default();

        for profile in self.profiles.values_mut() {
            let before = profile.active_stakes.len();
            let mut released: TokenAmount = 0;
            profile.active_stakes.retain(|stake| {
                if stake.is_expired(now) {
                    released = released.saturating_add(stake.amount);
                    false
                } else {
                    true
                }
            });

            let removed = before - profile.active_stakes.len();
            if removed > 0 {
                profile.total_staked = profile.total_staked.saturating_sub(released);
                cleanup.positions_removed += removed as u64;
                cleanup.amount_released = cleanup.amount_released.saturating_add(released);
                cleanup.users_affected += 1;
            }
        }

        if cleanup.positions_removed > 0 {
            info!(
                positions = cleanup.positions_removed,
                released = cleanup.amount_released,
                "expired stakes cleaned up"
            );
        }
        cleanup
    }

    /// Re-derive every profile's tax rate after a network change
    pub fn refresh_tax_rates(&mut self, network_health: f64) {
        for profile in self.profiles.values_mut() {
            profile.tax_rate = self.tax.calculate_user_tax_rate(profile, network_health);
        }
    }

    /// Apply the daily health-band adjustment to reward rates
    pub fn adjust_reward_rates(&mut self, network_health: f64) -> Option<RewardRates> {
        if self.rates.adjust_for_health(network_health, &self.config) {
            info!(
                base_node_reward = self.rates.base_node_reward,
                staking_apy = self.rates.staking_apy,
                "reward rates adjusted"
            );
            Some(self.rates)
        } else {
            None
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
