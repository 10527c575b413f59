//! Scalar types and protocol-wide constants.
//!
//! All amounts, prices and rates are fixed-point integers scaled by `WAD`
//! (1e18). Time is an explicit input everywhere: operations that depend on
//! elapsed time take a `Timestamp` and must be re-derivable from
//! `(last_timestamp, last_state, now)` alone.

/// Identifies a position owner.
pub type UserId = u64;

/// Identifies a market registered with the factory.
pub type MarketId = u64;

/// Unix time in seconds. Callers must pass non-decreasing values.
pub type Timestamp = u64;

/// Fixed-point scale (1e18).
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Seconds in a 365-day year, used to express per-second rates.
pub const SECONDS_PER_YEAR: u128 = 31_536_000;
