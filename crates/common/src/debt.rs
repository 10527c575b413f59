//! Debt-reporting capability.

use crate::error::CascadeError;

/// Anything whose outstanding debt feeds the monetary-policy aggregation:
/// market controllers and stabilization pools alike.
///
/// Implementations may fail (a market can be misconfigured or unreachable);
/// aggregating callers isolate failures per item, direct callers surface
/// them.
pub trait DebtSource {
    fn debt(&self) -> Result<u128, CascadeError>;
}
