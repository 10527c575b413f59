//! Band AMM — the soft-liquidation engine.
//!
//! Liquidity lives in discrete price bands: band `n` covers the interval
//! `(p_down(n), p_up(n)]`, with prices falling geometrically as `n` grows.
//! A borrower's collateral is spread over a contiguous band range below the
//! current price; as the market trades through those bands the collateral is
//! converted to stable (and back), which is what makes liquidation gradual
//! instead of an all-at-once seizure.

pub mod exchange;
pub mod math;
pub mod state;

pub use exchange::*;
pub use math::*;
pub use state::*;
