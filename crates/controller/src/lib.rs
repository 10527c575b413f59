//! Lending controller: loan lifecycle on top of the band AMM.
//!
//! The controller owns a [`cascade_amm::BandAmm`], tracks per-user debt with
//! a monotone interest multiplier, and decides health and liquidation.
//! Token custody is the caller's concern: operations return settlement
//! amounts instead of moving tokens.

pub mod callback;
pub mod controller;
pub mod loan;

pub use callback::*;
pub use controller::*;
pub use loan::*;
