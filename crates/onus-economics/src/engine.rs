//! # Economic Engine
//!
//! Explicit context object owning every component. Construct one per
//! process (or per test); there is no global state.
//!
//! ```text
//!  update_network_metrics ──► NetworkMetricsTracker ──► conditions
//!                                                         │
//!                       ┌─────────────────────────────────┤
//!                       ▼                                 ▼
//!                  DecayEngine                       TaxPolicy
//!             (acceleration, expiry)            (payout tax rate)
//!                       │                                 │
//!                       ▼                                 ▼
//!               TreasuryTax batch    StakePoolRegistry ─► PayoutCalculator
//!                       │                                 │
//!                       └──────────────► EventBus ◄───────┘
//! ```
//!
//! Commands return `Err` for unknown ids and invalid input; queries return
//! `Option`. Every state change is published on the [`EventBus`] after it
//! is committed.

use crate::clock::TimeSource;
use crate::config::EconomicsConfig;
use crate::decay::{
    AccelerationReason, ContentRegistration, DecayAccelerationEvent, DecayEngine, DecayMetrics,
    DecayableContent, QualityMetrics, QualityUpdate, TickOutcome,
};
use crate::error::Result;
use crate::events::{EconomicEvent, EventBus};
use crate::metrics::{CongestionLevel, HealthSample, NetworkMetrics, NetworkMetricsTracker, NetworkMetricsUpdate};
use crate::payout::{
    PayoutCalculation, PayoutCalculator, PayoutCycleSummary, RewardRates, StakeCleanup,
    UserEconomicProfile, UserProfileUpdate,
};
use crate::pools::{StakePool, StakePoolRegistry};
use crate::tax::TaxPolicy;
use crate::types::{Timestamp, TokenAmount};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Running treasury totals
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TreasuryLedger {
    /// Tokens collected from fully decayed stakes
    pub total_collected: TokenAmount,

    /// Tax withheld from payouts
    pub total_payout_tax: f64,

    /// Net rewards paid out
    pub total_rewards_paid: f64,

    /// Content items finalized
    pub expired_content: u64,
}

/// Result of the daily maintenance pass
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub stakes: StakeCleanup,

    /// Pools whose multiplier changed on recompute
    pub pools_recalculated: usize,

    /// New reward rates when the health band moved them
    pub adjusted_rates: Option<RewardRates>,

    pub timestamp: Timestamp,
}

/// Owner of all engine state
pub struct EconomicEngine {
    config: EconomicsConfig,
    clock: Arc<dyn TimeSource>,
    network: NetworkMetricsTracker,
    pools: StakePoolRegistry,
    decay: DecayEngine,
    payouts: PayoutCalculator,
    treasury: TreasuryLedger,
    events: EventBus,
}

impl EconomicEngine {
    /// Validate the configuration and build every component
    pub fn new(config: EconomicsConfig, clock: Arc<dyn TimeSource>) -> Result<Self> {
        config.validate()?;
        let now = clock.now();

        Ok(Self {
            network: NetworkMetricsTracker::new(config.network.clone(), now),
            pools: StakePoolRegistry::new(config.pools.clone()),
            decay: DecayEngine::new(config.decay.clone()),
            payouts: PayoutCalculator::new(config.rewards.clone(), TaxPolicy::new(config.tax.clone())),
            treasury: TreasuryLedger::default(),
            events: EventBus::new(),
            config,
            clock,
        })
    }

    pub fn config(&self) -> &EconomicsConfig {
        &self.config
    }

    /// Current time from the injected clock
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Get event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<EconomicEvent> {
        self.events.subscribe()
    }

    pub fn treasury(&self) -> &TreasuryLedger {
        &self.treasury
    }

    // ----- Network -----

    /// Merge an observation, then re-derive acceleration and tax rates
    pub fn update_network_metrics(&mut self, update: &NetworkMetricsUpdate) -> NetworkMetrics {
        let now = self.now();
        let metrics = self.network.update_network_metrics(update, now).clone();
        self.events.publish(EconomicEvent::NetworkUpdated {
            metrics: metrics.clone(),
        });

        let reason = if self.network.emergency_mode() {
            AccelerationReason::EmergencyMode
        } else {
            AccelerationReason::NetworkCongestion
        };
        self.recompute(reason, now);
        self.payouts.refresh_tax_rates(metrics.network_health);
        metrics
    }

    /// Force critical congestion on or off
    pub fn set_emergency_mode(&mut self, active: bool) {
        if self.network.emergency_mode() == active {
            return;
        }
        self.network.set_emergency_mode(active);
        if active {
            warn!("emergency mode activated");
        } else {
            info!("emergency mode cleared");
        }

        let now = self.now();
        self.recompute(AccelerationReason::EmergencyMode, now);
    }

    pub fn emergency_mode(&self) -> bool {
        self.network.emergency_mode()
    }

    pub fn network_metrics(&self) -> &NetworkMetrics {
        self.network.metrics()
    }

    pub fn get_congestion_level(&self, message_volume_ratio: f64) -> CongestionLevel {
        self.network.get_congestion_level(message_volume_ratio)
    }

    pub fn current_congestion(&self) -> CongestionLevel {
        self.network.current_congestion()
    }

    /// Append the current health to the sample history
    pub fn sample_network_health(&mut self) -> HealthSample {
        let now = self.now();
        self.network.sample_health(now)
    }

    pub fn health_samples(&self) -> impl Iterator<Item = &HealthSample> {
        self.network.health_samples()
    }

    // ----- Pools -----

    pub fn create_stake_pool(&mut self, user_id: &str, stake_amount: TokenAmount) -> Result<StakePool> {
        let now = self.now();
        let pool = self.pools.create_stake_pool(user_id, stake_amount, now)?;
        info!(pool_id = %pool.id, user_id = %user_id, stake = stake_amount, "stake pool created");
        self.events.publish(EconomicEvent::PoolCreated { pool: pool.clone() });
        Ok(pool)
    }

    pub fn join_stake_pool(
        &mut self,
        pool_id: &str,
        user_id: &str,
        stake_amount: TokenAmount,
    ) -> Result<StakePool> {
        let now = self.now();
        let pool = self.pools.join_stake_pool(pool_id, user_id, stake_amount, now)?;
        self.events.publish(EconomicEvent::PoolJoined {
            pool_id: pool.id.clone(),
            user_id: user_id.to_string(),
            pool: pool.clone(),
        });
        Ok(pool)
    }

    pub fn calculate_pool_multiplier(&self, total_staked: TokenAmount) -> f64 {
        self.pools.calculate_pool_multiplier(total_staked)
    }

    pub fn get_pool(&self, pool_id: &str) -> Option<&StakePool> {
        self.pools.get_pool(pool_id)
    }

    pub fn pools(&self) -> &StakePoolRegistry {
        &self.pools
    }

    // ----- Content decay -----

    pub fn register_content(&mut self, registration: ContentRegistration) -> Result<DecayableContent> {
        let now = self.now();
        let conditions = self.network.conditions();
        let content = self.decay.register_content(registration, &conditions, now)?;
        self.events.publish(EconomicEvent::ContentRegistered {
            content: content.clone(),
        });
        Ok(content)
    }

    pub fn update_content_quality(&mut self, content_id: &str, update: &QualityUpdate) -> Result<QualityMetrics> {
        let now = self.now();
        let conditions = self.network.conditions();
        let (metrics, change) = self
            .decay
            .update_content_quality(content_id, update, &conditions, now)?;

        self.events.publish(EconomicEvent::QualityUpdated {
            metrics: metrics.clone(),
        });
        if let Some(event) = change {
            self.events.publish(EconomicEvent::AccelerationChanged { event });
        }
        Ok(metrics)
    }

    pub fn preserve_content(&mut self, content_id: &str, reason: &str) -> Result<DecayableContent> {
        let now = self.now();
        let content = self.decay.preserve_content(content_id, reason, now)?;
        info!(content_id = %content_id, reason = %reason, "content preserved");
        self.events.publish(EconomicEvent::ContentPreserved {
            content_id: content.id.clone(),
            reason: reason.to_string(),
        });
        Ok(content)
    }

    pub fn remove_preservation(&mut self, content_id: &str) -> Result<DecayableContent> {
        let now = self.now();
        let conditions = self.network.conditions();
        let content = self.decay.remove_preservation(content_id, &conditions, now)?;
        self.events.publish(EconomicEvent::PreservationRemoved {
            content_id: content.id.clone(),
        });
        Ok(content)
    }

    /// Pin an item's acceleration until the next network update
    pub fn override_acceleration(&mut self, content_id: &str, factor: f64) -> Result<()> {
        let now = self.now();
        let conditions = self.network.conditions();
        if let Some(event) = self
            .decay
            .override_acceleration(content_id, factor, &conditions, now)?
        {
            self.events.publish(EconomicEvent::AccelerationChanged { event });
        }
        Ok(())
    }

    pub fn get_content(&self, content_id: &str) -> Option<&DecayableContent> {
        self.decay.get_content(content_id)
    }

    pub fn get_all_content(&self) -> Vec<&DecayableContent> {
        self.decay.get_all_content()
    }

    pub fn get_decay_history(&self) -> Vec<DecayAccelerationEvent> {
        self.decay.get_decay_history().cloned().collect()
    }

    /// Aggregate decay statistics; also published as `metrics:generated`
    pub fn get_decay_metrics(&self) -> DecayMetrics {
        let metrics = self
            .decay
            .get_decay_metrics(&self.network.conditions(), self.network.health_trend());
        self.events.publish(EconomicEvent::MetricsGenerated {
            metrics: metrics.clone(),
        });
        metrics
    }

    /// One decay pass; expired stakes are credited to the treasury
    pub fn run_decay_tick(&mut self) -> TickOutcome {
        let now = self.now();
        let outcome = self.decay.tick(now);

        if !outcome.expired.is_empty() {
            for tax in &outcome.expired {
                self.treasury.total_collected = self.treasury.total_collected.saturating_add(tax.tax_amount);
                self.treasury.expired_content += 1;
            }
            self.events.publish(EconomicEvent::ContentDecayed {
                expired: outcome.expired.clone(),
            });
        }
        outcome
    }

    // ----- Payouts -----

    pub fn update_user_profile(&mut self, user_id: &str, update: UserProfileUpdate) -> UserEconomicProfile {
        let now = self.now();
        self.payouts.update_user_profile(user_id, update, now).clone()
    }

    pub fn get_user_profile(&self, user_id: &str) -> Option<&UserEconomicProfile> {
        self.payouts.get_profile(user_id)
    }

    /// Compute and settle one user's payout
    pub fn calculate_user_payout(&mut self, user_id: &str) -> Result<PayoutCalculation> {
        let now = self.now();
        let health = self.network.metrics().network_health;
        let payout = self
            .payouts
            .calculate_user_payout(user_id, health, &self.pools, now)?;
        self.settle(&payout);
        Ok(payout)
    }

    /// Pay every known user
    pub fn run_payout_cycle(&mut self) -> PayoutCycleSummary {
        let now = self.now();
        let health = self.network.metrics().network_health;
        let (payouts, summary) = self.payouts.run_payout_cycle(health, &self.pools, now);

        for payout in &payouts {
            self.settle(payout);
        }
        self.events.publish(EconomicEvent::PayoutCycleCompleted {
            summary: summary.clone(),
        });
        summary
    }

    pub fn reward_rates(&self) -> RewardRates {
        self.payouts.rates()
    }

    /// Expired-stake cleanup, pool recompute and reward-rate adjustment
    pub fn run_daily_maintenance(&mut self) -> MaintenanceReport {
        let now = self.now();
        let stakes = self.payouts.cleanup_expired_stakes(now);
        let pools_recalculated = self.pools.recalculate_pool_multipliers();
        let adjusted_rates = self
            .payouts
            .adjust_reward_rates(self.network.metrics().network_health);

        info!(
            positions_removed = stakes.positions_removed,
            pools_recalculated,
            rates_adjusted = adjusted_rates.is_some(),
            "daily maintenance complete"
        );
        MaintenanceReport {
            stakes,
            pools_recalculated,
            adjusted_rates,
            timestamp: now,
        }
    }

    fn settle(&mut self, payout: &PayoutCalculation) {
        self.treasury.total_rewards_paid += payout.final_payout;
        self.treasury.total_payout_tax += payout.tax_deduction;
        self.events.publish(EconomicEvent::PayoutCalculated {
            payout: payout.clone(),
        });
    }

    fn recompute(&mut self, reason: AccelerationReason, now: Timestamp) {
        let conditions = self.network.conditions();
        for event in self.decay.recompute_accelerations(&conditions, reason, now) {
            self.events.publish(EconomicEvent::AccelerationChanged { event });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::decay::ContentType;
    use crate::error::EconomicsError;

    fn engine() -> (EconomicEngine, ManualClock) {
        let clock = ManualClock::new(1_700_000_000);
        let engine = EconomicEngine::new(EconomicsConfig::default(), Arc::new(clock.clone())).unwrap();
        (engine, clock)
    }

    fn post(id: &str) -> ContentRegistration {
        ContentRegistration {
            id: id.to_string(),
            user_id: "alice".to_string(),
            content_type: ContentType::Post,
            quality_score: 60.0,
            stake_amount: 100,
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EconomicsConfig::default();
        config.pools.max_participants = 0;
        let result = EconomicEngine::new(config, Arc::new(ManualClock::new(0)));
        assert!(matches!(result, Err(EconomicsError::InvalidConfig(_))));
    }

    #[test]
    fn test_network_update_publishes_in_order() {
        let (mut engine, _clock) = engine();
        engine.register_content(post("p1")).unwrap();
        let mut rx = engine.subscribe();

        engine.update_network_metrics(&NetworkMetricsUpdate::default().message_volume(9_800));

        assert_eq!(rx.try_recv().unwrap().name(), "network:updated");
        match rx.try_recv().unwrap() {
            EconomicEvent::AccelerationChanged { event } => {
                assert_eq!(event.reason, AccelerationReason::NetworkCongestion);
                assert_eq!(event.content_id, "p1");
            }
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[test]
    fn test_emergency_mode_accelerates() {
        let (mut engine, _clock) = engine();
        engine.register_content(post("p1")).unwrap();
        let calm = engine.get_content("p1").unwrap().acceleration_factor;

        engine.set_emergency_mode(true);
        let stressed = engine.get_content("p1").unwrap().acceleration_factor;
        assert!(stressed > calm);

        let history = engine.get_decay_history();
        assert_eq!(history.last().unwrap().reason, AccelerationReason::EmergencyMode);

        engine.set_emergency_mode(false);
        assert_eq!(engine.get_content("p1").unwrap().acceleration_factor, calm);
    }

    #[test]
    fn test_decay_tick_credits_treasury() {
        let (mut engine, clock) = engine();
        engine.register_content(post("p1")).unwrap();
        let mut rx = engine.subscribe();

        // 100 points at 2.5 * 0.8 per hour runs out after 50 hours
        clock.advance(60 * 3600);
        let outcome = engine.run_decay_tick();

        assert_eq!(outcome.expired.len(), 1);
        assert_eq!(engine.treasury().total_collected, 10);
        assert_eq!(engine.treasury().expired_content, 1);
        assert_eq!(rx.try_recv().unwrap().name(), "content:decayed");
    }

    #[test]
    fn test_tiny_override_keeps_content_live() {
        let (mut engine, clock) = engine();
        engine.register_content(post("p1")).unwrap();
        let mut rx = engine.subscribe();

        engine.override_acceleration("p1", 1e-15).unwrap();
        assert_eq!(rx.try_recv().unwrap().name(), "acceleration:changed");

        let content = engine.get_content("p1").unwrap();
        let horizon = EconomicsConfig::default().decay.preservation_period_secs;
        assert_eq!(content.expiry_time, engine.now() + horizon);

        clock.advance(60 * 3600);
        let outcome = engine.run_decay_tick();
        assert!(outcome.expired.is_empty());
        assert!(engine.get_content("p1").is_some());
    }

    #[test]
    fn test_payout_updates_ledger() {
        let (mut engine, clock) = engine();
        engine.update_user_profile(
            "alice",
            UserProfileUpdate {
                node_uptime: Some(99.0),
                ..UserProfileUpdate::default()
            },
        );
        clock.advance(3600);

        let summary = engine.run_payout_cycle();
        assert_eq!(summary.users_paid, 1);
        assert!((engine.treasury().total_rewards_paid - summary.total_final).abs() < 1e-9);
        assert!(engine.treasury().total_payout_tax > 0.0);

        assert!(matches!(
            engine.calculate_user_payout("bob"),
            Err(EconomicsError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_daily_maintenance() {
        let (mut engine, _clock) = engine();
        engine.create_stake_pool("alice", 50_000).unwrap();
        let report = engine.run_daily_maintenance();

        assert_eq!(report.pools_recalculated, 0);
        // Default health of 100 sits in the healthy band
        let rates = report.adjusted_rates.unwrap();
        assert!((rates.base_node_reward - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_include_health_trend() {
        let (mut engine, clock) = engine();
        engine.sample_network_health();
        engine.update_network_metrics(&NetworkMetricsUpdate::default().health(70.0));
        clock.advance_minutes(1);
        engine.sample_network_health();

        let metrics = engine.get_decay_metrics();
        assert_eq!(metrics.network_health_trend, -30.0);
        assert_eq!(engine.health_samples().count(), 2);
    }
}
