//! Shared identifier and time types

/// User (wallet/account) identifier supplied by the session layer
pub type UserId = String;

/// Content identifier supplied by the posting layer
pub type ContentId = String;

/// Stake pool identifier, derived by the registry on creation
pub type PoolId = String;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Whole-token amount
pub type TokenAmount = u64;

/// Seconds in one hour
pub const SECONDS_PER_HOUR: i64 = 3600;

/// Seconds in one day
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Seconds in one (non-leap) year
pub const SECONDS_PER_YEAR: i64 = 365 * SECONDS_PER_DAY;

/// Fractional hours elapsed from `from` to `to`, never negative
pub fn hours_between(from: Timestamp, to: Timestamp) -> f64 {
    (to - from).max(0) as f64 / SECONDS_PER_HOUR as f64
}
