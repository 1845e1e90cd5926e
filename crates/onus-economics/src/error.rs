//! Error types for economic engine operations

use crate::types::{ContentId, PoolId, UserId};
use thiserror::Error;

/// Result type alias for economic engine operations
pub type Result<T> = std::result::Result<T, EconomicsError>;

/// Errors surfaced by engine commands.
///
/// Derived quantities (decay score, tax rate, pool multiplier) are clamped to
/// their policy bounds instead of producing errors; only operations that
/// cannot yield a meaningful result fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EconomicsError {
    // === NotFound ===
    /// No economic profile exists for the user
    #[error("Profile not found for user: {0}")]
    ProfileNotFound(UserId),

    /// Content is not in the live set (never registered or already expired)
    #[error("Content not found: {0}")]
    ContentNotFound(ContentId),

    /// Stake pool does not exist
    #[error("Stake pool not found: {0}")]
    PoolNotFound(PoolId),

    // === CapacityExceeded ===
    /// Pool already holds the maximum number of participants
    #[error("Stake pool {pool_id} is full ({max} participants)")]
    PoolFull { pool_id: PoolId, max: u32 },

    // === InvalidInput ===
    /// Stake amount is zero or outside the accepted range
    #[error("Invalid stake amount: {amount} (accepted range {min}..={max})")]
    InvalidStake { amount: u64, min: u64, max: u64 },

    /// Content id already registered
    #[error("Content already registered: {0}")]
    DuplicateContent(ContentId),

    // === Configuration ===
    /// Configuration values violate an ordering or range rule
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EconomicsError {
    /// Stable numeric code for collaborators that log or forward errors
    pub fn code(&self) -> u32 {
        match self {
            Self::ProfileNotFound(_) => 2001,
            Self::ContentNotFound(_) => 2002,
            Self::PoolNotFound(_) => 2003,
            Self::PoolFull { .. } => 2101,
            Self::InvalidStake { .. } => 2201,
            Self::DuplicateContent(_) => 2202,
            Self::InvalidConfig(_) | Self::Config(_) => 2301,
        }
    }

    /// Whether the caller may retry the same command later with a chance of success
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PoolFull { .. } | Self::ProfileNotFound(_))
    }

    /// Whether this is a NotFound-class error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProfileNotFound(_) | Self::ContentNotFound(_) | Self::PoolNotFound(_)
        )
    }
}

impl From<toml::de::Error> for EconomicsError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EconomicsError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for EconomicsError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = EconomicsError::ProfileNotFound("alice".to_string());
        assert_eq!(err.code(), 2001);

        let err = EconomicsError::PoolFull {
            pool_id: "pool_1".to_string(),
            max: 100,
        };
        assert_eq!(err.code(), 2101);
    }

    #[test]
    fn test_error_display() {
        let err = EconomicsError::ProfileNotFound("alice".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Profile not found"));
        assert!(msg.contains("alice"));
    }

    #[test]
    fn test_error_classes() {
        assert!(EconomicsError::PoolNotFound("p".into()).is_not_found());
        assert!(!EconomicsError::InvalidConfig("x".into()).is_not_found());
        assert!(EconomicsError::PoolFull { pool_id: "p".into(), max: 1 }.is_recoverable());
        assert!(!EconomicsError::InvalidStake { amount: 0, min: 1, max: 10 }.is_recoverable());
    }
}
