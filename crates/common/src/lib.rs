//! Shared types, errors and fixed-point math for the cascade engine.

pub mod debt;
pub mod error;
pub mod math;
pub mod types;

pub use debt::*;
pub use error::*;
pub use math::*;
pub use types::*;
