//! # Tax Policy
//!
//! Effective payout tax rate per user.
//!
//! ```text
//! rate = base + (1 - health / 100) * health_adjustment
//!             + min(total_staked / stake_reference, 1) * stake_adjustment
//! ```
//!
//! With the default policy the rate moves between 15% (perfect health, no
//! stake) and 30% (zero health, large stake); the result is always clamped
//! to `[base_rate, max_rate]`.

use crate::config::TaxConfig;
use crate::payout::UserEconomicProfile;

/// Stateless tax rate calculator
#[derive(Clone, Debug, Default)]
pub struct TaxPolicy {
    config: TaxConfig,
}

impl TaxPolicy {
    pub fn new(config: TaxConfig) -> Self {
        Self { config }
    }

    /// Policy floor
    pub fn min_rate(&self) -> f64 {
        self.config.base_rate
    }

    /// Policy ceiling
    pub fn max_rate(&self) -> f64 {
        self.config.max_rate
    }

    /// Effective tax rate for a user under the given network health (0-100)
    pub fn calculate_user_tax_rate(&self, profile: &UserEconomicProfile, network_health: f64) -> f64 {
        let health = if network_health.is_finite() {
            network_health.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let stake_ratio =
            (profile.total_staked as f64 / self.config.stake_reference.max(1) as f64).min(1.0);

        let rate = self.config.base_rate
            + (1.0 - health / 100.0) * self.config.health_adjustment
            + stake_ratio * self.config.stake_adjustment;

        rate.clamp(self.config.base_rate, self.config.max_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn profile(total_staked: u64) -> UserEconomicProfile {
        UserEconomicProfile {
            total_staked,
            ..UserEconomicProfile::new("alice", 0)
        }
    }

    #[test]
    fn test_rate_bounds() {
        let policy = TaxPolicy::default();

        let best = policy.calculate_user_tax_rate(&profile(0), 100.0);
        assert!((best - 0.15).abs() < 1e-12);

        let worst = policy.calculate_user_tax_rate(&profile(1_000_000), 0.0);
        assert!((worst - 0.30).abs() < 1e-12);
    }

    #[test]
    fn test_rate_components() {
        let policy = TaxPolicy::default();
        // 0.15 + 0.5 * 0.1 + 0.5 * 0.05
        let rate = policy.calculate_user_tax_rate(&profile(5_000), 50.0);
        assert!((rate - 0.225).abs() < 1e-12);
    }

    #[test]
    fn test_ceiling_applies_to_generous_config() {
        let policy = TaxPolicy::new(TaxConfig {
            health_adjustment: 0.5,
            ..TaxConfig::default()
        });
        let rate = policy.calculate_user_tax_rate(&profile(0), 0.0);
        assert_eq!(rate, 0.30);
    }

    #[test]
    fn test_non_finite_health_treated_as_unhealthy() {
        let policy = TaxPolicy::default();
        let rate = policy.calculate_user_tax_rate(&profile(0), f64::NAN);
        assert!((rate - 0.25).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_rate_within_policy(stake in 0u64..u64::MAX, health in -50.0f64..150.0) {
            let policy = TaxPolicy::default();
            let rate = policy.calculate_user_tax_rate(&profile(stake), health);
            prop_assert!((0.15..=0.30).contains(&rate));
        }
    }
}
