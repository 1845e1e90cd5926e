//! Economic cycle scheduler
//!
//! The only driver of time. Four independent periodic tasks run against the
//! shared engine:
//!
//! | Task | Default interval | Work |
//! |------|------------------|------|
//! | Health sampling | 1 min | append a health sample |
//! | Decay tick | 1 min | advance decay, finalize expired stakes |
//! | Payout cycle | 1 hour | pay every known user |
//! | Maintenance | 1 day | stake cleanup, pool recompute, rate adjustment |
//!
//! Each task holds the engine lock for its whole pass, so two passes of the
//! same kind never overlap.

use crate::config::SchedulerConfig;
use crate::engine::EconomicEngine;
use crate::types::Timestamp;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodic task kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTask {
    HealthSample,
    DecayTick,
    PayoutCycle,
    Maintenance,
}

/// Run counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub health_samples: u64,
    pub decay_ticks: u64,
    pub payout_cycles: u64,
    pub maintenance_runs: u64,
    /// Time of the last `run_due` pass
    pub last_run: Option<Timestamp>,
}

#[derive(Clone, Copy, Debug)]
struct TaskTimer {
    task: CycleTask,
    interval: i64,
    next_due: Timestamp,
}

impl TaskTimer {
    fn new(task: CycleTask, interval: i64, start: Timestamp) -> Self {
        let interval = interval.max(1);
        Self {
            task,
            interval,
            next_due: start + interval,
        }
    }

    /// Consume one due slot; missed slots collapse into a single run
    fn take_due(&mut self, now: Timestamp) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due += self.interval;
        if self.next_due <= now {
            self.next_due = now + self.interval;
        }
        true
    }
}

/// Time driver for an [`EconomicEngine`]
pub struct EconomicCycleScheduler {
    engine: Arc<Mutex<EconomicEngine>>,
    timers: [TaskTimer; 4],
    poll_interval: Duration,
    stats: SchedulerStats,
}

impl EconomicCycleScheduler {
    pub fn new(engine: Arc<Mutex<EconomicEngine>>, config: &SchedulerConfig) -> Self {
        let start = engine.lock().now();
        let timers = [
            TaskTimer::new(CycleTask::HealthSample, config.health_sample_secs, start),
            TaskTimer::new(CycleTask::DecayTick, config.decay_tick_secs, start),
            TaskTimer::new(CycleTask::PayoutCycle, config.payout_cycle_secs, start),
            TaskTimer::new(CycleTask::Maintenance, config.maintenance_secs, start),
        ];
        let shortest = timers.iter().map(|t| t.interval).min().unwrap_or(60);

        Self {
            engine,
            timers,
            poll_interval: Duration::from_secs(shortest as u64),
            stats: SchedulerStats::default(),
        }
    }

    pub fn engine(&self) -> Arc<Mutex<EconomicEngine>> {
        Arc::clone(&self.engine)
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Next due time of a task
    pub fn next_due(&self, task: CycleTask) -> Option<Timestamp> {
        self.timers.iter().find(|t| t.task == task).map(|t| t.next_due)
    }

    /// Run every task due at `now` and return the tasks that ran
    pub fn run_due(&mut self, now: Timestamp) -> Vec<CycleTask> {
        let mut ran = Vec::new();
        for i in 0..self.timers.len() {
            if self.timers[i].take_due(now) {
                let task = self.timers[i].task;
                self.run_task(task);
                ran.push(task);
            }
        }
        self.stats.last_run = Some(now);
        ran
    }

    /// Poll the engine clock until a shutdown signal arrives
    pub async fn run(&mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            poll_secs = self.poll_interval.as_secs(),
            "Starting economic cycle scheduler"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Economic cycle scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let now = self.engine.lock().now();
                    let ran = self.run_due(now);
                    if !ran.is_empty() {
                        debug!(?ran, now, "scheduled tasks ran");
                    }
                }
            }
        }
    }

    fn run_task(&mut self, task: CycleTask) {
        let mut engine = self.engine.lock();
        match task {
            CycleTask::HealthSample => {
                engine.sample_network_health();
                self.stats.health_samples += 1;
            }
            CycleTask::DecayTick => {
                engine.run_decay_tick();
                self.stats.decay_ticks += 1;
            }
            CycleTask::PayoutCycle => {
                engine.run_payout_cycle();
                self.stats.payout_cycles += 1;
            }
            CycleTask::Maintenance => {
                engine.run_daily_maintenance();
                self.stats.maintenance_runs += 1;
            }
        }
    }
}
