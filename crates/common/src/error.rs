//! Engine error type.
//!
//! Every fallible operation returns `Result<_, CascadeError>` and is
//! all-or-nothing: an error means no state was committed. Display strings are
//! the protocol's user-facing messages.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CascadeError {
    /// Band count below the minimum at loan creation.
    #[error("Need more ticks")]
    TooFewBands,

    /// Band count above the maximum at loan creation.
    #[error("Need less ticks")]
    TooManyBands,

    /// Requested debt exceeds what the collateral supports at any placement.
    #[error("Debt too high")]
    DebtTooHigh,

    /// The user already has an open loan.
    #[error("Loan already created")]
    LoanExists,

    /// Operation on a user with no open loan.
    #[error("Loan doesn't exist")]
    NoLoan,

    /// A zero amount where a positive one is required.
    #[error("Amount is zero")]
    AmountZero,

    /// The user already has bands allocated in the AMM.
    #[error("Deposit already exists")]
    DepositExists,

    /// The user has no bands allocated in the AMM.
    #[error("No deposit")]
    NoDeposit,

    /// Deposit range must sit strictly below the active band.
    #[error("Deposit overlaps active band")]
    DepositBelowBand,

    /// Band index outside the supported range.
    #[error("Band out of range")]
    BandOutOfRange,

    /// Band range changes are forbidden while part of the position is
    /// converted to stable.
    #[error("Position in soft liquidation")]
    InSoftLiquidation,

    /// Output below the caller's declared minimum. Retryable with adjusted
    /// parameters.
    #[error("Slippage")]
    Slippage,

    /// Liquidation attempted on a position whose health is above the
    /// threshold.
    #[error("Not enough rekt")]
    NotEligible,

    /// A collaborator (market, oracle) call failed.
    #[error("External read failed")]
    ExternalRead,

    /// The deleverage callback returned less stable than the settled debt.
    #[error("Callback didn't provide enough funds")]
    CallbackShortfall,

    /// The deleverage callback itself failed.
    #[error("Callback failed")]
    CallbackFailed,

    /// Withdrawing or repaying more than the position holds.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Fixed-point arithmetic left the representable range. Fatal invariant
    /// violation, never recoverable.
    #[error("Arithmetic overflow")]
    Overflow,
}
