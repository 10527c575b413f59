//! Per-loan state and settlement summaries.

/// An open loan. Debt is stored with the interest multiplier at the last
/// touch; the current value re-derives as
/// `debt * rate_mul(now) / rate_mul_snapshot`, so no per-call state beyond
/// the clock is needed.
#[derive(Debug, Clone)]
pub struct Loan {
    /// Debt at the last touch.
    pub debt: u128,
    /// Interest multiplier at the last touch.
    pub rate_mul_snapshot: u128,
    /// Cumulative WAD fraction of the original position taken by partial
    /// liquidations. Cleared whenever the position itself is modified.
    pub liquidated_frac: u128,
}

/// What a liquidation settled. Amounts are informational for custody:
/// the engine has already committed the ledger changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationOutcome {
    /// Debt removed from the ledger.
    pub debt_repaid: u128,
    /// Stable pulled out of the user's bands.
    pub stable_from_amm: u128,
    /// Collateral owed to the caller.
    pub collateral_to_caller: u128,
    /// Stable the caller must supply on top of the AMM stable (and any
    /// callback proceeds) to cover the repaid debt.
    pub stable_due_from_caller: u128,
    /// Stable left over after covering the debt, owed to the caller.
    pub stable_refund: u128,
}

/// What a repayment settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepayOutcome {
    /// Debt removed from the ledger (capped at the outstanding amount).
    pub debt_repaid: u128,
    /// Collateral returned to the user (full closes only).
    pub collateral_returned: u128,
    /// Stable the user must burn beyond what their bands already held.
    pub stable_due_from_user: u128,
    /// Surplus stable from the bands, returned to the user.
    pub stable_refund: u128,
}
