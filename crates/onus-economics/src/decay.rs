//! # Content Decay
//!
//! Every staked content item carries a decay score that starts at 100 and
//! falls each tick by `decay_rate * acceleration_factor * elapsed_hours`.
//! When it reaches zero the stake is finalized: a share goes to the treasury
//! and the item leaves the live set.
//!
//! ## Base Decay Rates (score points per hour)
//!
//! | Content | Rate | Excellent (>=85) | Good (>=70) | Poor (<=40) |
//! |---------|------|------------------|-------------|-------------|
//! | Post | 2.5 | 1.25 | 2.0 | 5.0 |
//! | Comment | 3.0 | 1.5 | 2.4 | 6.0 |
//! | Stake | 1.0 | 0.5 | 0.8 | 2.0 |
//! | Node | 0.5 | 0.25 | 0.4 | 1.0 |
//!
//! ## Acceleration
//!
//! ```text
//! acceleration = congestion_base * health_adjustment * quality_adjustment
//!
//! congestion_base:    low 1.0 | medium 1.5 | high 3.0 | critical 10.0
//! health_adjustment:  1.5 if health < 50 | 0.8 if health > 80 | else 1.0
//! quality_adjustment: 1.3 if quality < fair | 0.7 if excellent | else 1.0
//! ```
//!
//! ## States
//!
//! ```text
//!   register ──► Active ──(score reaches 0)──► Expired (removed, taxed)
//!                 │  ▲
//!        preserve │  │ remove_preservation
//!                 ▼  │
//!               Preserved (acceleration 0, never decays)
//! ```
//!
//! Decay parameters are always re-derived from current inputs, never
//! patched incrementally.

use crate::config::DecayConfig;
use crate::error::{EconomicsError, Result};
use crate::metrics::{CongestionLevel, NetworkConditions};
use crate::types::{hours_between, ContentId, Timestamp, TokenAmount, UserId, SECONDS_PER_HOUR};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Kind of staked content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Post,
    Comment,
    Stake,
    Node,
}

impl ContentType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Stake => "stake",
            Self::Node => "node",
        }
    }
}

/// Input for [`DecayEngine::register_content`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentRegistration {
    pub id: ContentId,
    pub user_id: UserId,
    pub content_type: ContentType,
    /// Initial quality (0-100)
    pub quality_score: f64,
    pub stake_amount: TokenAmount,
}

/// Live decay state of one content item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayableContent {
    pub id: ContentId,
    pub user_id: UserId,
    pub content_type: ContentType,
    pub quality_score: f64,
    pub stake_amount: TokenAmount,
    pub created_at: Timestamp,
    /// Time up to which decay has been applied
    pub last_activity: Timestamp,
    /// 0-100, starts at 100
    pub decay_score: f64,
    /// Score points per hour before acceleration
    pub decay_rate: f64,
    pub acceleration_factor: f64,
    pub expiry_time: Timestamp,
    pub is_preserved: bool,
    pub preservation_reason: Option<String>,
}

impl DecayableContent {
    /// Decaying: not preserved and score above zero
    pub fn is_decaying(&self) -> bool {
        !self.is_preserved && self.decay_score > 0.0
    }

    /// Effective score loss per hour
    pub fn effective_rate(&self) -> f64 {
        self.decay_rate * self.acceleration_factor
    }
}

/// Engagement observations behind a content item's quality score
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub content_id: ContentId,
    pub engagement_score: f64,
    pub reputation_impact: f64,
    pub network_contribution: f64,
    /// 0.4 engagement + 0.3 reputation + 0.3 network contribution
    pub overall_quality: f64,
}

impl QualityMetrics {
    pub fn new(content_id: ContentId, update: &QualityUpdate) -> Self {
        let engagement_score = clamp_score(update.engagement_score);
        let reputation_impact = clamp_score(update.reputation_impact);
        let network_contribution = clamp_score(update.network_contribution);
        let overall_quality =
            engagement_score * 0.4 + reputation_impact * 0.3 + network_contribution * 0.3;

        Self {
            content_id,
            engagement_score,
            reputation_impact,
            network_contribution,
            overall_quality,
        }
    }
}

/// Fresh quality observation from the engagement collaborator
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityUpdate {
    pub engagement_score: f64,
    pub reputation_impact: f64,
    pub network_contribution: f64,
}

impl QualityUpdate {
    /// Same value on every axis
    pub fn uniform(score: f64) -> Self {
        Self {
            engagement_score: score,
            reputation_impact: score,
            network_contribution: score,
        }
    }
}

/// Why an acceleration factor changed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelerationReason {
    NetworkCongestion,
    QualityDegradation,
    EmergencyMode,
    ManualOverride,
}

/// Coarse network impact of an acceleration change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkImpact {
    Low,
    Medium,
    High,
}

impl From<CongestionLevel> for NetworkImpact {
    fn from(level: CongestionLevel) -> Self {
        match level {
            CongestionLevel::Low => Self::Low,
            CongestionLevel::Medium => Self::Medium,
            CongestionLevel::High | CongestionLevel::Critical => Self::High,
        }
    }
}

/// Recorded change of a content item's acceleration factor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayAccelerationEvent {
    pub content_id: ContentId,
    pub user_id: UserId,
    pub previous_acceleration: f64,
    pub new_acceleration: f64,
    pub reason: AccelerationReason,
    pub network_impact: NetworkImpact,
    /// Hours of remaining lifetime removed (negative when decay slowed)
    pub estimated_time_saved: f64,
    pub timestamp: Timestamp,
}

/// Treasury instruction for a fully decayed stake
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryTax {
    pub content_id: ContentId,
    pub user_id: UserId,
    pub stake_amount: TokenAmount,
    /// floor(stake_amount * treasury_tax_rate)
    pub tax_amount: TokenAmount,
    pub expired_at: Timestamp,
}

/// Result of one decay pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutcome {
    /// Items whose score was advanced
    pub processed: usize,
    /// Items finalized this pass, ordered by content id
    pub expired: Vec<TreasuryTax>,
}

/// Aggregate view of the live content set
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayMetrics {
    pub total_content: usize,
    pub decaying_content: usize,
    pub preserved_content: usize,
    pub average_decay_score: f64,
    /// Average over decaying items
    pub average_acceleration_factor: f64,
    pub congestion_level: CongestionLevel,
    /// Tokens per hour heading to the treasury at current rates
    pub estimated_treasury_tax_rate: f64,
    /// Pearson correlation between quality and decay scores
    pub quality_decay_correlation: f64,
    /// Tokens per hour burned at current rates
    pub estimated_burn_rate: f64,
    /// Health change across the retained sample window
    pub network_health_trend: f64,
}

/// Owner of per-content decay state
#[derive(Debug)]
pub struct DecayEngine {
    contents: HashMap<ContentId, DecayableContent>,
    quality: HashMap<ContentId, QualityMetrics>,
    history: VecDeque<DecayAccelerationEvent>,
    config: DecayConfig,
}

impl DecayEngine {
    pub fn new(config: DecayConfig) -> Self {
        Self {
            contents: HashMap::new(),
            quality: HashMap::new(),
            history: VecDeque::new(),
            config,
        }
    }

    /// Quality multiplier on the base decay rate
    pub fn quality_multiplier(&self, quality_score: f64) -> f64 {
        let q = &self.config.quality;
        if quality_score >= q.excellent {
            0.5
        } else if quality_score >= q.good {
            0.8
        } else if quality_score <= q.poor {
            2.0
        } else {
            1.0
        }
    }

    /// Base decay rate for a content type at a given quality
    pub fn calculate_decay_rate(&self, content_type: ContentType, quality_score: f64) -> f64 {
        let rates = &self.config.base_rates;
        let base = match content_type {
            ContentType::Post => rates.post,
            ContentType::Comment => rates.comment,
            ContentType::Stake => rates.stake,
            ContentType::Node => rates.node,
        };
        base * self.quality_multiplier(quality_score)
    }

    /// Acceleration factor under the given conditions, clamped to the configured maximum
    pub fn calculate_acceleration(&self, conditions: &NetworkConditions, quality_score: f64) -> f64 {
        let health_adjustment = if conditions.network_health < 50.0 {
            1.5
        } else if conditions.network_health > 80.0 {
            0.8
        } else {
            1.0
        };

        let q = &self.config.quality;
        let quality_adjustment = if quality_score < q.fair {
            1.3
        } else if quality_score >= q.excellent {
            0.7
        } else {
            1.0
        };

        (conditions.congestion.base_acceleration() * health_adjustment * quality_adjustment)
            .clamp(0.0, self.config.max_acceleration)
    }

    /// Start tracking a content item
    pub fn register_content(
        &mut self,
        registration: ContentRegistration,
        conditions: &NetworkConditions,
        now: Timestamp,
    ) -> Result<DecayableContent> {
        let (min, max) = (self.config.min_stake, self.config.max_stake);
        if registration.stake_amount < min || registration.stake_amount > max {
            return Err(EconomicsError::InvalidStake {
                amount: registration.stake_amount,
                min,
                max,
            });
        }
        if self.contents.contains_key(&registration.id) {
            return Err(EconomicsError::DuplicateContent(registration.id));
        }

        let quality_score = clamp_score(registration.quality_score);
        let mut content = DecayableContent {
            id: registration.id,
            user_id: registration.user_id,
            content_type: registration.content_type,
            quality_score,
            stake_amount: registration.stake_amount,
            created_at: now,
            last_activity: now,
            decay_score: 100.0,
            decay_rate: 0.0,
            acceleration_factor: 0.0,
            expiry_time: now,
            is_preserved: false,
            preservation_reason: None,
        };
        self.rederive(&mut content, conditions, now);

        let metrics = QualityMetrics::new(content.id.clone(), &QualityUpdate::uniform(quality_score));
        self.quality.insert(content.id.clone(), metrics);
        self.contents.insert(content.id.clone(), content.clone());

        debug!(
            content_id = %content.id,
            content_type = content.content_type.name(),
            decay_rate = content.decay_rate,
            acceleration = content.acceleration_factor,
            "content registered"
        );
        Ok(content)
    }

    /// Replace the quality observation and re-derive decay parameters
    pub fn update_content_quality(
        &mut self,
        content_id: &str,
        update: &QualityUpdate,
        conditions: &NetworkConditions,
        now: Timestamp,
    ) -> Result<(QualityMetrics, Option<DecayAccelerationEvent>)> {
        let mut content = self
            .contents
            .get(content_id)
            .cloned()
            .ok_or_else(|| EconomicsError::ContentNotFound(content_id.to_string()))?;

        let metrics = QualityMetrics::new(content.id.clone(), update);
        content.quality_score = metrics.overall_quality;

        let previous = content.acceleration_factor;
        self.rederive(&mut content, conditions, now);
        let event = self.note_change(
            &content,
            previous,
            AccelerationReason::QualityDegradation,
            conditions.congestion,
            now,
        );

        self.quality.insert(content.id.clone(), metrics.clone());
        self.contents.insert(content.id.clone(), content);
        Ok((metrics, event))
    }

    /// Advance decay of every active item to `now` and finalize the exhausted ones
    pub fn tick(&mut self, now: Timestamp) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let mut exhausted = Vec::new();

        for content in self.contents.values_mut() {
            if !content.is_decaying() {
                continue;
            }
            let hours = hours_between(content.last_activity, now);
            let decay_amount = content.effective_rate() * hours;
            content.decay_score = (content.decay_score - decay_amount).max(0.0);
            content.last_activity = now.max(content.last_activity);
            outcome.processed += 1;

            if content.decay_score <= 0.0 {
                exhausted.push(content.id.clone());
            }
        }

        exhausted.sort();
        for id in exhausted {
            if let Some(content) = self.contents.remove(&id) {
                self.quality.remove(&id);
                let tax_amount = treasury_share(content.stake_amount, self.config.treasury_tax_rate);
                info!(
                    content_id = %content.id,
                    user_id = %content.user_id,
                    stake = content.stake_amount,
                    tax = tax_amount,
                    "content fully decayed"
                );
                outcome.expired.push(TreasuryTax {
                    content_id: content.id,
                    user_id: content.user_id,
                    stake_amount: content.stake_amount,
                    tax_amount,
                    expired_at: now,
                });
            }
        }

        outcome
    }

    /// Exempt an item from decay
    pub fn preserve_content(&mut self, content_id: &str, reason: &str, now: Timestamp) -> Result<DecayableContent> {
        let content = self
            .contents
            .get_mut(content_id)
            .ok_or_else(|| EconomicsError::ContentNotFound(content_id.to_string()))?;

        content.is_preserved = true;
        content.preservation_reason = Some(reason.to_string());
        content.acceleration_factor = 0.0;
        content.expiry_time = now.saturating_add(self.config.preservation_period_secs);
        Ok(content.clone())
    }

    /// Return a preserved item to normal decay with freshly derived parameters
    pub fn remove_preservation(
        &mut self,
        content_id: &str,
        conditions: &NetworkConditions,
        now: Timestamp,
    ) -> Result<DecayableContent> {
        let mut content = self
            .contents
            .get(content_id)
            .cloned()
            .ok_or_else(|| EconomicsError::ContentNotFound(content_id.to_string()))?;

        content.is_preserved = false;
        content.preservation_reason = None;
        // Time spent preserved never counts as decay
        content.last_activity = now;
        self.rederive(&mut content, conditions, now);

        self.contents.insert(content.id.clone(), content.clone());
        Ok(content)
    }

    /// Pin an item's acceleration until the next network-driven recompute
    pub fn override_acceleration(
        &mut self,
        content_id: &str,
        factor: f64,
        conditions: &NetworkConditions,
        now: Timestamp,
    ) -> Result<Option<DecayAccelerationEvent>> {
        let mut content = self
            .contents
            .get(content_id)
            .cloned()
            .ok_or_else(|| EconomicsError::ContentNotFound(content_id.to_string()))?;
        if content.is_preserved {
            return Ok(None);
        }

        let previous = content.acceleration_factor;
        content.acceleration_factor = if factor.is_finite() {
            factor.clamp(0.0, self.config.max_acceleration)
        } else {
            previous
        };
        content.expiry_time = self.expiry_for(&content, now);
        let event = self.note_change(
            &content,
            previous,
            AccelerationReason::ManualOverride,
            conditions.congestion,
            now,
        );

        self.contents.insert(content.id.clone(), content);
        Ok(event)
    }

    /// Re-derive acceleration for every non-preserved item after a network change
    pub fn recompute_accelerations(
        &mut self,
        conditions: &NetworkConditions,
        reason: AccelerationReason,
        now: Timestamp,
    ) -> Vec<DecayAccelerationEvent> {
        let mut ids: Vec<ContentId> = self
            .contents
            .values()
            .filter(|c| !c.is_preserved)
            .map(|c| c.id.clone())
            .collect();
        ids.sort();

        let mut events = Vec::new();
        for id in ids {
            let Some(mut content) = self.contents.get(&id).cloned() else {
                continue;
            };
            let previous = content.acceleration_factor;
            content.acceleration_factor = self.calculate_acceleration(conditions, content.quality_score);
            content.expiry_time = self.expiry_for(&content, now);

            if let Some(event) = self.note_change(&content, previous, reason, conditions.congestion, now) {
                events.push(event);
            }
            self.contents.insert(id, content);
        }

        if !events.is_empty() {
            debug!(changed = events.len(), congestion = %conditions.congestion, "acceleration recomputed");
        }
        events
    }

    pub fn get_content(&self, content_id: &str) -> Option<&DecayableContent> {
        self.contents.get(content_id)
    }

    pub fn get_quality(&self, content_id: &str) -> Option<&QualityMetrics> {
        self.quality.get(content_id)
    }

    /// All live content ordered by id
    pub fn get_all_content(&self) -> Vec<&DecayableContent> {
        let mut all: Vec<&DecayableContent> = self.contents.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Acceleration history, oldest first
    pub fn get_decay_history(&self) -> impl Iterator<Item = &DecayAccelerationEvent> {
        self.history.iter()
    }

    pub fn content_count(&self) -> usize {
        self.contents.len()
    }

    /// Aggregate statistics over the live set. `health_trend` comes from the
    /// network health sample window, which this engine does not own.
    pub fn get_decay_metrics(&self, conditions: &NetworkConditions, health_trend: f64) -> DecayMetrics {
        let total_content = self.contents.len();
        let decaying: Vec<&DecayableContent> =
            self.contents.values().filter(|c| c.is_decaying()).collect();
        let preserved_content = self.contents.values().filter(|c| c.is_preserved).count();

        let average_decay_score = mean(self.contents.values().map(|c| c.decay_score));
        let average_acceleration_factor = mean(decaying.iter().map(|c| c.acceleration_factor));

        // Stake tokens leaving decaying items per hour
        let stake_outflow: f64 = decaying
            .iter()
            .map(|c| c.stake_amount as f64 * c.effective_rate() / 100.0)
            .sum();
        let tax_rate = self.config.treasury_tax_rate;

        let all = self.get_all_content();
        let qualities: Vec<f64> = all.iter().map(|c| c.quality_score).collect();
        let scores: Vec<f64> = all.iter().map(|c| c.decay_score).collect();

        DecayMetrics {
            total_content,
            decaying_content: decaying.len(),
            preserved_content,
            average_decay_score,
            average_acceleration_factor,
            congestion_level: conditions.congestion,
            estimated_treasury_tax_rate: stake_outflow * tax_rate,
            quality_decay_correlation: pearson_correlation(&qualities, &scores),
            estimated_burn_rate: stake_outflow * (1.0 - tax_rate),
            network_health_trend: health_trend,
        }
    }

    fn rederive(&self, content: &mut DecayableContent, conditions: &NetworkConditions, now: Timestamp) {
        content.decay_rate = self.calculate_decay_rate(content.content_type, content.quality_score);
        if content.is_preserved {
            content.acceleration_factor = 0.0;
            content.expiry_time = now.saturating_add(self.config.preservation_period_secs);
        } else {
            content.acceleration_factor = self.calculate_acceleration(conditions, content.quality_score);
            content.expiry_time = self.expiry_for(content, now);
        }
    }

    /// Projected time the remaining score runs out at the current effective
    /// rate, never further out than one preservation period
    fn expiry_for(&self, content: &DecayableContent, now: Timestamp) -> Timestamp {
        let horizon = self.config.preservation_period_secs;
        let secs = match remaining_hours(content.decay_score, content.effective_rate()) {
            Some(hours) => (hours * SECONDS_PER_HOUR as f64).ceil().min(horizon as f64) as i64,
            None => horizon,
        };
        now.saturating_add(secs)
    }

    /// Record an acceleration change above the event threshold
    fn note_change(
        &mut self,
        content: &DecayableContent,
        previous: f64,
        reason: AccelerationReason,
        congestion: CongestionLevel,
        now: Timestamp,
    ) -> Option<DecayAccelerationEvent> {
        let new = content.acceleration_factor;
        if (new - previous).abs() <= self.config.acceleration_event_threshold {
            return None;
        }

        let before = remaining_hours(content.decay_score, content.decay_rate * previous);
        let after = remaining_hours(content.decay_score, content.decay_rate * new);
        let estimated_time_saved = match (before, after) {
            (Some(b), Some(a)) => b - a,
            _ => 0.0,
        };

        let event = DecayAccelerationEvent {
            content_id: content.id.clone(),
            user_id: content.user_id.clone(),
            previous_acceleration: previous,
            new_acceleration: new,
            reason,
            network_impact: congestion.into(),
            estimated_time_saved,
            timestamp: now,
        };

        self.history.push_back(event.clone());
        while self.history.len() > self.config.history_capacity {
            self.history.pop_front();
        }
        Some(event)
    }
}

/// Pearson correlation coefficient; 0.0 for fewer than two pairs or zero variance
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        cov / denominator
    }
}

fn remaining_hours(score: f64, effective_rate: f64) -> Option<f64> {
    if effective_rate > 0.0 {
        Some(score.max(0.0) / effective_rate)
    } else {
        None
    }
}

/// Integer treasury share so fractional rates never round a whole token away
fn treasury_share(stake: TokenAmount, rate: f64) -> TokenAmount {
    let bps = (rate.clamp(0.0, 1.0) * 10_000.0).round() as u128;
    (stake as u128 * bps / 10_000) as TokenAmount
}

fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
