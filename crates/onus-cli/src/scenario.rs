//! Scenario replay
//!
//! A scenario is a JSON document of timed inputs (network observations,
//! profiles, pools, content, preservation, emergency toggles) replayed
//! minute by minute against a manual clock.

use anyhow::Context;
use onus_economics::engine::TreasuryLedger;
use onus_economics::payout::RewardRates;
use onus_economics::scheduler::SchedulerStats;
use onus_economics::{
    ContentRegistration, DecayMetrics, DecayableContent, EconomicCycleScheduler, EconomicEngine,
    EconomicsConfig, ManualClock, NetworkMetricsUpdate, QualityUpdate, Timestamp, UserEconomicProfile,
    UserProfileUpdate,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};

/// Timed scenario inputs
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Start time (Unix seconds)
    pub start: Timestamp,
    /// Minutes to simulate
    pub duration_minutes: u64,
    pub network: Vec<NetworkStep>,
    pub users: Vec<UserStep>,
    pub pools: Vec<PoolStep>,
    pub content: Vec<ContentStep>,
    pub quality: Vec<QualityStep>,
    pub preserve: Vec<PreserveStep>,
    pub emergency: Vec<EmergencyStep>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NetworkStep {
    #[serde(default)]
    pub at_minute: u64,
    pub update: NetworkMetricsUpdate,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserStep {
    #[serde(default)]
    pub at_minute: u64,
    pub user_id: String,
    #[serde(default)]
    pub profile: UserProfileUpdate,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PoolMember {
    pub user_id: String,
    pub stake: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PoolStep {
    #[serde(default)]
    pub at_minute: u64,
    pub creator: String,
    pub stake: u64,
    #[serde(default)]
    pub members: Vec<PoolMember>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ContentStep {
    #[serde(default)]
    pub at_minute: u64,
    pub content: ContentRegistration,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QualityStep {
    pub at_minute: u64,
    pub content_id: String,
    pub update: QualityUpdate,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PreserveStep {
    pub at_minute: u64,
    pub content_id: String,
    /// `None` removes preservation
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmergencyStep {
    pub at_minute: u64,
    pub active: bool,
}

/// Final state of a replay
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub minutes: u64,
    pub treasury: TreasuryLedger,
    pub decay: DecayMetrics,
    pub reward_rates: RewardRates,
    pub scheduler: SchedulerStats,
    /// Events observed, by name
    pub events: BTreeMap<&'static str, u64>,
    /// Events dropped because the replay fell behind the channel
    pub events_lagged: u64,
    /// Commands that were rejected
    pub rejected_commands: u64,
    pub live_content: Vec<DecayableContent>,
    /// Final profiles of the scenario's users, by user id
    pub profiles: Vec<UserEconomicProfile>,
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let scenario = serde_json::from_str(&content)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        Ok(scenario)
    }

    /// Replay against a fresh engine built from `config`
    pub fn replay(&self, config: &EconomicsConfig, minutes: Option<u64>) -> anyhow::Result<SimulationReport> {
        let minutes = minutes.unwrap_or(self.duration_minutes);
        let clock = ManualClock::new(self.start);
        let engine = EconomicEngine::new(config.clone(), Arc::new(clock.clone()))?;
        let engine = Arc::new(Mutex::new(engine));
        let mut scheduler = EconomicCycleScheduler::new(Arc::clone(&engine), &config.scheduler);
        let mut rx = engine.lock().subscribe();

        let mut events: BTreeMap<&'static str, u64> = BTreeMap::new();
        let mut events_lagged = 0;
        let mut rejected_commands = 0;

        info!(start = self.start, minutes, "replaying scenario");

        for minute in 0..=minutes {
            if minute > 0 {
                let now = clock.advance_minutes(1);
                scheduler.run_due(now);
            }
            rejected_commands += self.apply_inputs(&mut engine.lock(), minute);

            loop {
                match rx.try_recv() {
                    Ok(event) => *events.entry(event.name()).or_default() += 1,
                    Err(TryRecvError::Lagged(n)) => events_lagged += n,
                    Err(_) => break,
                }
            }
        }

        let engine = engine.lock();
        let user_ids: BTreeSet<&str> = self.users.iter().map(|u| u.user_id.as_str()).collect();
        Ok(SimulationReport {
            started_at: self.start,
            finished_at: engine.now(),
            minutes,
            treasury: engine.treasury().clone(),
            decay: engine.get_decay_metrics(),
            reward_rates: engine.reward_rates(),
            scheduler: scheduler.stats().clone(),
            events,
            events_lagged,
            rejected_commands,
            live_content: engine.get_all_content().into_iter().cloned().collect(),
            profiles: user_ids
                .into_iter()
                .filter_map(|id| engine.get_user_profile(id).cloned())
                .collect(),
        })
    }

    /// Apply every input scheduled for `minute`; returns rejected commands
    fn apply_inputs(&self, engine: &mut EconomicEngine, minute: u64) -> u64 {
        let mut rejected = 0;
        let mut reject = |what: &str, err: &dyn std::fmt::Display| {
            warn!(minute, "{} rejected: {}", what, err);
            rejected += 1;
        };

        for step in self.emergency.iter().filter(|s| s.at_minute == minute) {
            engine.set_emergency_mode(step.active);
        }
        for step in self.network.iter().filter(|s| s.at_minute == minute) {
            engine.update_network_metrics(&step.update);
        }
        for step in self.users.iter().filter(|s| s.at_minute == minute) {
            engine.update_user_profile(&step.user_id, step.profile.clone());
        }
        for step in self.pools.iter().filter(|s| s.at_minute == minute) {
            match engine.create_stake_pool(&step.creator, step.stake) {
                Ok(pool) => {
                    for member in &step.members {
                        if let Err(e) = engine.join_stake_pool(&pool.id, &member.user_id, member.stake) {
                            reject("pool join", &e);
                        }
                    }
                }
                Err(e) => reject("pool creation", &e),
            }
        }
        for step in self.content.iter().filter(|s| s.at_minute == minute) {
            if let Err(e) = engine.register_content(step.content.clone()) {
                reject("content registration", &e);
            }
        }
        for step in self.quality.iter().filter(|s| s.at_minute == minute) {
            if let Err(e) = engine.update_content_quality(&step.content_id, &step.update) {
                reject("quality update", &e);
            }
        }
        for step in self.preserve.iter().filter(|s| s.at_minute == minute) {
            let result = match &step.reason {
                Some(reason) => engine.preserve_content(&step.content_id, reason),
                None => engine.remove_preservation(&step.content_id),
            };
            if let Err(e) = result {
                reject("preservation change", &e);
            }
        }

        rejected
    }
}
