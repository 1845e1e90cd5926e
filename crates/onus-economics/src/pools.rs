//! # Stake Pools
//!
//! Pooled stakes earn a size-based reward multiplier with diminishing returns.
//!
//! ## Multiplier Curve
//!
//! | Pool Size (x threshold) | Multiplier |
//! |-------------------------|------------|
//! | < 1 | 1.00 |
//! | 1 | 1.00 |
//! | 10 | 1.20 |
//! | 100 | 1.40 |
//! | 1,000 | 1.60 |
//!
//! Growth is logarithmic so very large pools cannot dominate rewards.

use crate::config::PoolConfig;
use crate::error::{EconomicsError, Result};
use crate::types::{PoolId, Timestamp, TokenAmount, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A pooled stake shared by several users
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StakePool {
    pub id: PoolId,
    /// User that opened the pool
    pub creator: UserId,
    pub total_staked: TokenAmount,
    pub participant_count: u32,
    /// total_staked / participant_count
    pub average_stake: f64,
    /// Reward multiplier (>= 1.0)
    pub pool_multiplier: f64,
    pub last_activity: Timestamp,
    /// Operator-reported performance (0-100)
    pub performance_score: f64,
    /// Stake contributed by each member
    participants: HashMap<UserId, TokenAmount>,
}

impl StakePool {
    /// Stake a user holds in this pool
    pub fn stake_of(&self, user_id: &str) -> Option<TokenAmount> {
        self.participants.get(user_id).copied()
    }

    pub fn members(&self) -> impl Iterator<Item = (&UserId, &TokenAmount)> {
        self.participants.iter()
    }

    fn refresh_derived(&mut self, config: &PoolConfig) {
        self.participant_count = self.participants.len().max(1) as u32;
        self.average_stake = self.total_staked as f64 / self.participant_count as f64;
        self.pool_multiplier = calculate_pool_multiplier(config, self.total_staked);
    }
}

/// A user's share in one pool, used by payout calculation
#[derive(Clone, Debug, PartialEq)]
pub struct PoolShare {
    pub pool_id: PoolId,
    pub stake: TokenAmount,
    pub pool_multiplier: f64,
}

/// Registry of all stake pools
#[derive(Debug, Default)]
pub struct StakePoolRegistry {
    pools: HashMap<PoolId, StakePool>,
    config: PoolConfig,
    /// Pools created so far, mixed into id derivation
    created: u64,
}

impl StakePoolRegistry {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            pools: HashMap::new(),
            config,
            created: 0,
        }
    }

    /// Open a pool with the creator as its only participant
    pub fn create_stake_pool(
        &mut self,
        user_id: &str,
        stake_amount: TokenAmount,
        timestamp: Timestamp,
    ) -> Result<StakePool> {
        if stake_amount == 0 {
            return Err(EconomicsError::InvalidStake {
                amount: stake_amount,
                min: 1,
                max: TokenAmount::MAX,
            });
        }

        let id = self.derive_pool_id(user_id, timestamp);
        let mut pool = StakePool {
            id: id.clone(),
            creator: user_id.to_string(),
            total_staked: stake_amount,
            participant_count: 1,
            average_stake: 0.0,
            pool_multiplier: 1.0,
            last_activity: timestamp,
            performance_score: 100.0,
            participants: HashMap::from([(user_id.to_string(), stake_amount)]),
        };
        pool.refresh_derived(&self.config);

        self.pools.insert(id, pool.clone());
        self.created += 1;
        Ok(pool)
    }

    /// Add stake to an existing pool.
    ///
    /// A full pool rejects every join, including top-ups from existing
    /// members. Below capacity a member's top-up adds to their stake without
    /// counting as a new participant.
    pub fn join_stake_pool(
        &mut self,
        pool_id: &str,
        user_id: &str,
        stake_amount: TokenAmount,
        timestamp: Timestamp,
    ) -> Result<StakePool> {
        if stake_amount == 0 {
            return Err(EconomicsError::InvalidStake {
                amount: stake_amount,
                min: 1,
                max: TokenAmount::MAX,
            });
        }

        let max = self.config.max_participants;
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| EconomicsError::PoolNotFound(pool_id.to_string()))?;

        if pool.participant_count >= max {
            return Err(EconomicsError::PoolFull {
                pool_id: pool_id.to_string(),
                max,
            });
        }

        *pool.participants.entry(user_id.to_string()).or_insert(0) += stake_amount;
        pool.total_staked = pool.total_staked.saturating_add(stake_amount);
        pool.last_activity = timestamp;
        pool.refresh_derived(&self.config);

        Ok(pool.clone())
    }

    /// Multiplier for a pool of the given size
    pub fn calculate_pool_multiplier(&self, total_staked: TokenAmount) -> f64 {
        calculate_pool_multiplier(&self.config, total_staked)
    }

    /// Re-derive every multiplier from current pool sizes; returns pools changed
    pub fn recalculate_pool_multipliers(&mut self) -> usize {
        let mut changed = 0;
        for pool in self.pools.values_mut() {
            let before = pool.pool_multiplier;
            pool.refresh_derived(&self.config);
            if (pool.pool_multiplier - before).abs() > f64::EPSILON {
                changed += 1;
            }
        }
        changed
    }

    /// Record an operator-reported performance score for a pool
    pub fn set_performance_score(&mut self, pool_id: &str, score: f64) -> Result<()> {
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| EconomicsError::PoolNotFound(pool_id.to_string()))?;
        pool.performance_score = if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 };
        Ok(())
    }

    pub fn get_pool(&self, pool_id: &str) -> Option<&StakePool> {
        self.pools.get(pool_id)
    }

    pub fn pools(&self) -> impl Iterator<Item = &StakePool> {
        self.pools.values()
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Every pool the user holds stake in
    pub fn shares_for_user(&self, user_id: &str) -> Vec<PoolShare> {
        let mut shares: Vec<PoolShare> = self
            .pools
            .values()
            .filter_map(|pool| {
                pool.stake_of(user_id).map(|stake| PoolShare {
                    pool_id: pool.id.clone(),
                    stake,
                    pool_multiplier: pool.pool_multiplier,
                })
            })
            .collect();
        shares.sort_by(|a, b| a.pool_id.cmp(&b.pool_id));
        shares
    }

    /// Sum of all pooled stake
    pub fn total_pooled(&self) -> TokenAmount {
        self.pools.values().map(|p| p.total_staked).sum()
    }

    fn derive_pool_id(&self, user_id: &str, timestamp: Timestamp) -> PoolId {
        let hash = blake3::hash(
            &[
                user_id.as_bytes(),
                &timestamp.to_le_bytes(),
                &self.created.to_le_bytes(),
            ]
            .concat(),
        );
        format!("pool_{}", hex::encode(&hash.as_bytes()[..8]))
    }
}

/// `1 + log10(total / threshold) * slope` above the threshold, 1.0 below it
pub fn calculate_pool_multiplier(config: &PoolConfig, total_staked: TokenAmount) -> f64 {
    let threshold = config.multiplier_threshold.max(1);
    if total_staked < threshold {
        return 1.0;
    }
    let ratio = total_staked as f64 / threshold as f64;
    (1.0 + ratio.log10() * config.curve_slope).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> StakePoolRegistry {
        StakePoolRegistry::new(PoolConfig::default())
    }

    #[test]
    fn test_multiplier_curve() {
        let r = registry();
        assert_eq!(r.calculate_pool_multiplier(0), 1.0);
        assert_eq!(r.calculate_pool_multiplier(999), 1.0);
        assert!((r.calculate_pool_multiplier(1_000) - 1.0).abs() < 1e-9);
        assert!((r.calculate_pool_multiplier(10_000) - 1.2).abs() < 1e-9);
        assert!((r.calculate_pool_multiplier(100_000) - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_create_pool() {
        let mut r = registry();
        let pool = r.create_stake_pool("alice", 5_000, 10).unwrap();

        assert_eq!(pool.participant_count, 1);
        assert_eq!(pool.total_staked, 5_000);
        assert_eq!(pool.average_stake, 5_000.0);
        assert!(pool.pool_multiplier > 1.0);
        assert_eq!(pool.stake_of("alice"), Some(5_000));
        assert!(pool.id.starts_with("pool_"));
    }

    #[test]
    fn test_zero_stake_rejected() {
        let mut r = registry();
        let result = r.create_stake_pool("alice", 0, 10);
        assert!(matches!(result, Err(EconomicsError::InvalidStake { .. })));
        assert_eq!(r.pool_count(), 0);
    }

    #[test]
    fn test_pool_ids_are_unique() {
        let mut r = registry();
        let a = r.create_stake_pool("alice", 10, 10).unwrap();
        let b = r.create_stake_pool("alice", 10, 10).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_join_updates_totals() {
        let mut r = registry();
        let pool = r.create_stake_pool("alice", 600, 10).unwrap();
        assert_eq!(pool.pool_multiplier, 1.0);

        let joined = r.join_stake_pool(&pool.id, "bob", 9_400, 20).unwrap();
        assert_eq!(joined.participant_count, 2);
        assert_eq!(joined.total_staked, 10_000);
        assert_eq!(joined.average_stake, 5_000.0);
        assert!((joined.pool_multiplier - 1.2).abs() < 1e-9);
        assert_eq!(joined.last_activity, 20);
    }

    #[test]
    fn test_join_unknown_pool() {
        let mut r = registry();
        let result = r.join_stake_pool("pool_missing", "bob", 10, 0);
        assert!(matches!(result, Err(EconomicsError::PoolNotFound(_))));
    }

    #[test]
    fn test_join_full_pool() {
        let mut r = StakePoolRegistry::new(PoolConfig {
            max_participants: 2,
            ..PoolConfig::default()
        });
        let pool = r.create_stake_pool("alice", 10, 0).unwrap();
        r.join_stake_pool(&pool.id, "bob", 10, 0).unwrap();

        let result = r.join_stake_pool(&pool.id, "carol", 10, 0);
        assert!(matches!(result, Err(EconomicsError::PoolFull { max: 2, .. })));

        let top_up = r.join_stake_pool(&pool.id, "bob", 5, 0);
        assert!(matches!(top_up, Err(EconomicsError::PoolFull { max: 2, .. })));
        assert_eq!(r.get_pool(&pool.id).unwrap().stake_of("bob"), Some(10));
    }

    #[test]
    fn test_member_top_up_below_capacity() {
        let mut r = StakePoolRegistry::new(PoolConfig {
            max_participants: 3,
            ..PoolConfig::default()
        });
        let pool = r.create_stake_pool("alice", 10, 0).unwrap();
        r.join_stake_pool(&pool.id, "bob", 10, 0).unwrap();

        let topped = r.join_stake_pool(&pool.id, "bob", 5, 30).unwrap();
        assert_eq!(topped.participant_count, 2);
        assert_eq!(topped.total_staked, 25);
        assert_eq!(topped.stake_of("bob"), Some(15));
    }

    #[test]
    fn test_shares_for_user() {
        let mut r = registry();
        let p1 = r.create_stake_pool("alice", 100, 0).unwrap();
        let p2 = r.create_stake_pool("bob", 20_000, 0).unwrap();
        r.join_stake_pool(&p2.id, "alice", 300, 0).unwrap();

        let shares = r.shares_for_user("alice");
        assert_eq!(shares.len(), 2);
        let total: u64 = shares.iter().map(|s| s.stake).sum();
        assert_eq!(total, 400);
        assert!(shares.iter().any(|s| s.pool_id == p1.id && s.pool_multiplier == 1.0));
        assert!(r.shares_for_user("nobody").is_empty());
    }

    #[test]
    fn test_recalculate_after_config_change() {
        let mut r = registry();
        r.create_stake_pool("alice", 10_000, 0).unwrap();
        assert_eq!(r.recalculate_pool_multipliers(), 0);

        r.config.multiplier_threshold = 100;
        assert_eq!(r.recalculate_pool_multipliers(), 1);
        let pool = r.pools().next().unwrap();
        assert!((pool.pool_multiplier - 1.4).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_multiplier_non_decreasing(a in 0u64..1_000_000_000, b in 0u64..1_000_000_000) {
            let r = registry();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(r.calculate_pool_multiplier(lo) <= r.calculate_pool_multiplier(hi));
            prop_assert!(r.calculate_pool_multiplier(lo) >= 1.0);
        }
    }
}
