//! # Network Metrics
//!
//! Holds the single current [`NetworkMetrics`] snapshot and classifies
//! congestion from message volume.
//!
//! ## Congestion Levels
//!
//! | Level | Volume / Capacity | Base Acceleration |
//! |-------|-------------------|-------------------|
//! | Low | < 0.60 | 1.0x |
//! | Medium | >= 0.60 | 1.5x |
//! | High | >= 0.80 | 3.0x |
//! | Critical | >= 0.95 | 10.0x |

use crate::config::{CongestionThresholds, NetworkConfig};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Categorical network load classification
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl CongestionLevel {
    /// Base decay acceleration for this level
    pub fn base_acceleration(&self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 1.5,
            Self::High => 3.0,
            Self::Critical => 10.0,
        }
    }

    /// Get level name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Latest observed network state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub total_nodes: u64,
    pub active_nodes: u64,
    pub total_staked: u64,
    /// Overall health (0-100)
    pub network_health: f64,
    /// Messages observed in the current window
    pub message_volume: u64,
    /// Average relay latency in milliseconds
    pub average_latency: f64,
    /// Network-wide uptime percentage (0-100)
    pub uptime_percentage: f64,
    pub last_update: Timestamp,
}

impl Default for NetworkMetrics {
    fn default() -> Self {
        Self {
            total_nodes: 0,
            active_nodes: 0,
            total_staked: 0,
            network_health: 100.0,
            message_volume: 0,
            average_latency: 0.0,
            uptime_percentage: 100.0,
            last_update: 0,
        }
    }
}

/// Partial update merged into the snapshot; `None` fields are left unchanged
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkMetricsUpdate {
    pub total_nodes: Option<u64>,
    pub active_nodes: Option<u64>,
    pub total_staked: Option<u64>,
    pub network_health: Option<f64>,
    pub message_volume: Option<u64>,
    pub average_latency: Option<f64>,
    pub uptime_percentage: Option<f64>,
}

impl NetworkMetricsUpdate {
    pub fn health(mut self, health: f64) -> Self {
        self.network_health = Some(health);
        self
    }

    pub fn message_volume(mut self, volume: u64) -> Self {
        self.message_volume = Some(volume);
        self
    }

    pub fn nodes(mut self, total: u64, active: u64) -> Self {
        self.total_nodes = Some(total);
        self.active_nodes = Some(active);
        self
    }
}

/// Read-only view of the conditions the decay engine reacts to
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkConditions {
    pub congestion: CongestionLevel,
    pub network_health: f64,
}

/// One per-minute health observation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub timestamp: Timestamp,
    pub network_health: f64,
    pub congestion: CongestionLevel,
}

/// Owner of the network snapshot
#[derive(Clone, Debug)]
pub struct NetworkMetricsTracker {
    snapshot: NetworkMetrics,
    config: NetworkConfig,
    /// Forces critical congestion regardless of volume
    emergency_mode: bool,
    samples: VecDeque<HealthSample>,
}

impl NetworkMetricsTracker {
    pub fn new(config: NetworkConfig, now: Timestamp) -> Self {
        Self {
            snapshot: NetworkMetrics {
                last_update: now,
                ..NetworkMetrics::default()
            },
            config,
            emergency_mode: false,
            samples: VecDeque::new(),
        }
    }

    /// Current snapshot
    pub fn metrics(&self) -> &NetworkMetrics {
        &self.snapshot
    }

    /// Merge a partial observation into the snapshot.
    ///
    /// The merged value is built aside and swapped in whole, so readers never
    /// observe a half-applied update. Out-of-range health and non-finite
    /// floats are clamped rather than rejected.
    pub fn update_network_metrics(&mut self, update: &NetworkMetricsUpdate, now: Timestamp) -> &NetworkMetrics {
        let mut next = self.snapshot.clone();

        if let Some(v) = update.total_nodes {
            next.total_nodes = v;
        }
        if let Some(v) = update.active_nodes {
            next.active_nodes = v;
        }
        if let Some(v) = update.total_staked {
            next.total_staked = v;
        }
        if let Some(v) = update.network_health {
            next.network_health = clamp_finite(v, 0.0, 100.0, next.network_health);
        }
        if let Some(v) = update.message_volume {
            next.message_volume = v;
        }
        if let Some(v) = update.average_latency {
            next.average_latency = clamp_finite(v, 0.0, f64::MAX, next.average_latency);
        }
        if let Some(v) = update.uptime_percentage {
            next.uptime_percentage = clamp_finite(v, 0.0, 100.0, next.uptime_percentage);
        }
        next.last_update = now;

        self.snapshot = next;
        &self.snapshot
    }

    /// Classify a message-volume ratio
    pub fn get_congestion_level(&self, message_volume_ratio: f64) -> CongestionLevel {
        classify_congestion(&self.config.congestion, message_volume_ratio)
    }

    /// Current message volume relative to provisioned capacity
    pub fn message_volume_ratio(&self) -> f64 {
        self.snapshot.message_volume as f64 / self.config.message_capacity.max(1) as f64
    }

    /// Congestion of the current snapshot, honoring emergency mode
    pub fn current_congestion(&self) -> CongestionLevel {
        if self.emergency_mode {
            return CongestionLevel::Critical;
        }
        self.get_congestion_level(self.message_volume_ratio())
    }

    /// Conditions handed to the decay engine
    pub fn conditions(&self) -> NetworkConditions {
        NetworkConditions {
            congestion: self.current_congestion(),
            network_health: self.snapshot.network_health,
        }
    }

    pub fn set_emergency_mode(&mut self, active: bool) {
        self.emergency_mode = active;
    }

    pub fn emergency_mode(&self) -> bool {
        self.emergency_mode
    }

    /// Record the current health into the bounded sample history
    pub fn sample_health(&mut self, now: Timestamp) -> HealthSample {
        let sample = HealthSample {
            timestamp: now,
            network_health: self.snapshot.network_health,
            congestion: self.current_congestion(),
        };
        self.samples.push_back(sample);
        while self.samples.len() > self.config.health_history_len.max(1) {
            self.samples.pop_front();
        }
        sample
    }

    pub fn health_samples(&self) -> impl Iterator<Item = &HealthSample> {
        self.samples.iter()
    }

    /// Health change between the oldest and newest retained samples
    pub fn health_trend(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.network_health - first.network_health,
            _ => 0.0,
        }
    }
}

/// Threshold mapping shared by the tracker and offline callers
pub fn classify_congestion(thresholds: &CongestionThresholds, ratio: f64) -> CongestionLevel {
    if ratio >= thresholds.critical {
        CongestionLevel::Critical
    } else if ratio >= thresholds.high {
        CongestionLevel::High
    } else if ratio >= thresholds.medium {
        CongestionLevel::Medium
    } else {
        CongestionLevel::Low
    }
}

fn clamp_finite(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> NetworkMetricsTracker {
        NetworkMetricsTracker::new(NetworkConfig::default(), 0)
    }

    #[test]
    fn test_congestion_thresholds() {
        let t = tracker();
        assert_eq!(t.get_congestion_level(0.0), CongestionLevel::Low);
        assert_eq!(t.get_congestion_level(0.59), CongestionLevel::Low);
        assert_eq!(t.get_congestion_level(0.6), CongestionLevel::Medium);
        assert_eq!(t.get_congestion_level(0.8), CongestionLevel::High);
        assert_eq!(t.get_congestion_level(0.95), CongestionLevel::Critical);
        assert_eq!(t.get_congestion_level(3.0), CongestionLevel::Critical);
    }

    #[test]
    fn test_partial_update_merges() {
        let mut t = tracker();
        t.update_network_metrics(&NetworkMetricsUpdate::default().nodes(10, 8), 100);
        t.update_network_metrics(&NetworkMetricsUpdate::default().health(72.0), 200);

        let m = t.metrics();
        assert_eq!(m.total_nodes, 10);
        assert_eq!(m.active_nodes, 8);
        assert_eq!(m.network_health, 72.0);
        assert_eq!(m.last_update, 200);
    }

    #[test]
    fn test_health_is_clamped() {
        let mut t = tracker();
        t.update_network_metrics(&NetworkMetricsUpdate::default().health(140.0), 1);
        assert_eq!(t.metrics().network_health, 100.0);

        t.update_network_metrics(&NetworkMetricsUpdate::default().health(-3.0), 2);
        assert_eq!(t.metrics().network_health, 0.0);

        t.update_network_metrics(&NetworkMetricsUpdate::default().health(f64::NAN), 3);
        assert_eq!(t.metrics().network_health, 0.0);
    }

    #[test]
    fn test_volume_ratio_drives_congestion() {
        let mut t = tracker();
        t.update_network_metrics(&NetworkMetricsUpdate::default().message_volume(9_600), 1);
        assert_eq!(t.current_congestion(), CongestionLevel::Critical);

        t.update_network_metrics(&NetworkMetricsUpdate::default().message_volume(1_000), 2);
        assert_eq!(t.current_congestion(), CongestionLevel::Low);
    }

    #[test]
    fn test_emergency_mode_forces_critical() {
        let mut t = tracker();
        t.set_emergency_mode(true);
        assert_eq!(t.conditions().congestion, CongestionLevel::Critical);
        t.set_emergency_mode(false);
        assert_eq!(t.conditions().congestion, CongestionLevel::Low);
    }

    #[test]
    fn test_health_samples_are_bounded() {
        let config = NetworkConfig {
            health_history_len: 3,
            ..NetworkConfig::default()
        };
        let mut t = NetworkMetricsTracker::new(config, 0);
        for (i, health) in [90.0, 80.0, 70.0, 60.0].iter().enumerate() {
            t.update_network_metrics(&NetworkMetricsUpdate::default().health(*health), i as i64);
            t.sample_health(i as i64);
        }

        assert_eq!(t.health_samples().count(), 3);
        assert_eq!(t.health_trend(), -20.0);
    }
}
