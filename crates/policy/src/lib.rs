//! Monetary policy: the per-second borrow rate as feedback on system-wide
//! debt imbalance.
//!
//! A factory enumerates markets; stabilization pools declare the debt they
//! carry. The policy smooths each market's debt reading through a
//! time-decayed candle so one `rate_write` never has to trust a single
//! instantaneous reading, and tolerates individual markets failing to read.

pub mod candle;
pub mod mock;
pub mod policy;
pub mod sources;

pub use candle::*;
pub use policy::*;
pub use sources::*;
