//! Deleverage hook for extended liquidation.

use cascade_common::{CascadeError, UserId};

/// Funds a callback hands back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackResponse {
    /// Stable provided toward the settled debt, typically from selling the
    /// collateral it was offered.
    pub stablecoins: u128,
}

/// Inversion-of-control hook invoked mid-liquidation.
///
/// The controller calls it with the prospective split before committing any
/// state; the hook may consume the offered collateral and must return enough
/// stable that, together with the position's own stable, the settled debt is
/// covered. Any error is fatal to the whole liquidation and leaves the
/// engine untouched.
pub trait LiquidationCallback {
    fn on_liquidate(
        &mut self,
        user: UserId,
        stable_from_amm: u128,
        collateral_from_amm: u128,
        debt_to_repay: u128,
        extra: &[u128],
    ) -> Result<CallbackResponse, CascadeError>;
}
