//! # Onus Economics - Stake Decay & Reward Feedback Engine
//!
//! Economic core of the OnusOne content network. Users stake tokens on
//! content; stakes decay over time at a rate driven by content quality and
//! network conditions, and a treasury tax is collected when a stake fully
//! decays. Node operators and stakers earn hourly payouts shaped by uptime,
//! reputation, pool membership and network health.
//!
//! ## Feedback Loop
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  network metrics ──► congestion ──► decay acceleration ──► expiry    │
//! │        │                                                    │        │
//! │        └──────────► tax rate ──► payouts        treasury tax ◄┘      │
//! │                                    ▲                                 │
//! │                    stake pools ────┘ (size multiplier)               │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`metrics`] | Network snapshot, congestion classification, health samples |
//! | [`pools`] | Stake pool formation and size multiplier |
//! | [`decay`] | Per-content decay state machine and acceleration history |
//! | [`tax`] | Per-user payout tax rate |
//! | [`payout`] | Per-cycle reward computation and user profiles |
//! | [`engine`] | Context object owning all components, event publication |
//! | [`scheduler`] | Periodic health, decay, payout and maintenance tasks |
//!
//! ## Periodic Tasks
//!
//! | Task | Interval |
//! |------|----------|
//! | Health sampling | 1 minute |
//! | Decay tick | 1 minute |
//! | Payout cycle | 1 hour |
//! | Maintenance | 1 day |

pub mod clock;
pub mod config;
pub mod decay;
pub mod engine;
pub mod error;
pub mod events;
pub mod metrics;
pub mod payout;
pub mod pools;
pub mod scheduler;
pub mod tax;
pub mod types;

// Re-exports
pub use clock::{ManualClock, SystemClock, TimeSource};
pub use config::{EconomicsConfig, LogFormat};
pub use decay::{
    AccelerationReason, ContentRegistration, ContentType, DecayAccelerationEvent, DecayEngine,
    DecayMetrics, DecayableContent, QualityMetrics, QualityUpdate, TreasuryTax,
};
pub use engine::{EconomicEngine, MaintenanceReport, TreasuryLedger};
pub use error::{EconomicsError, Result};
pub use events::{EconomicEvent, EventBus};
pub use metrics::{CongestionLevel, NetworkMetrics, NetworkMetricsTracker, NetworkMetricsUpdate};
pub use payout::{PayoutCalculation, PayoutCalculator, UserEconomicProfile, UserProfileUpdate};
pub use pools::{StakePool, StakePoolRegistry};
pub use scheduler::{CycleTask, EconomicCycleScheduler};
pub use tax::TaxPolicy;
pub use types::{ContentId, PoolId, Timestamp, TokenAmount, UserId};
