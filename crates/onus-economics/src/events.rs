//! Engine events
//!
//! Collaborators (treasury, ledger, persistence) subscribe to a typed
//! broadcast channel. Events are delivered in publication order; a receiver
//! that falls more than [`EVENT_CHANNEL_CAPACITY`] events behind observes
//! `RecvError::Lagged`.

use crate::decay::{DecayAccelerationEvent, DecayMetrics, DecayableContent, QualityMetrics, TreasuryTax};
use crate::metrics::NetworkMetrics;
use crate::payout::{PayoutCalculation, PayoutCycleSummary};
use crate::pools::StakePool;
use crate::types::{ContentId, PoolId, UserId};
use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered events per subscriber
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Notification published by the engine
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EconomicEvent {
    /// Network snapshot replaced
    NetworkUpdated { metrics: NetworkMetrics },

    PoolCreated { pool: StakePool },

    PoolJoined { pool_id: PoolId, user_id: UserId, pool: StakePool },

    ContentRegistered { content: DecayableContent },

    QualityUpdated { metrics: QualityMetrics },

    ContentPreserved { content_id: ContentId, reason: String },

    PreservationRemoved { content_id: ContentId },

    /// Acceleration moved by more than the recording threshold
    AccelerationChanged { event: DecayAccelerationEvent },

    /// Batch of stakes finalized in one decay pass
    ContentDecayed { expired: Vec<TreasuryTax> },

    PayoutCalculated { payout: PayoutCalculation },

    PayoutCycleCompleted { summary: PayoutCycleSummary },

    MetricsGenerated { metrics: DecayMetrics },
}

impl EconomicEvent {
    /// Wire name used by collaborators
    pub fn name(&self) -> &'static str {
        match self {
            Self::NetworkUpdated { .. } => "network:updated",
            Self::PoolCreated { .. } => "pool:created",
            Self::PoolJoined { .. } => "pool:joined",
            Self::ContentRegistered { .. } => "content:registered",
            Self::QualityUpdated { .. } => "quality:updated",
            Self::ContentPreserved { .. } => "content:preserved",
            Self::PreservationRemoved { .. } => "preservation:removed",
            Self::AccelerationChanged { .. } => "acceleration:changed",
            Self::ContentDecayed { .. } => "content:decayed",
            Self::PayoutCalculated { .. } => "payout:calculated",
            Self::PayoutCycleCompleted { .. } => "payout:cycle",
            Self::MetricsGenerated { .. } => "metrics:generated",
        }
    }
}

/// Publisher side of the event channel
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<EconomicEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Get event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<EconomicEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers; events with no subscriber are dropped
    pub fn publish(&self, event: EconomicEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
