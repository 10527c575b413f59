//! Test doubles for debt sources: a settable market and a market whose
//! reads always fail (a misconfigured integration). Used by the test suites
//! and the keeper's demo world.

use std::cell::Cell;

use cascade_common::{CascadeError, DebtSource};

/// A market (or stabilization pool) with an externally settable debt.
pub struct MockMarket {
    debt: Cell<u128>,
}

impl MockMarket {
    pub fn new(debt: u128) -> Self {
        Self {
            debt: Cell::new(debt),
        }
    }

    pub fn set_debt(&self, debt: u128) {
        self.debt.set(debt);
    }
}

impl DebtSource for MockMarket {
    fn debt(&self) -> Result<u128, CascadeError> {
        Ok(self.debt.get())
    }
}

/// Every read fails, the way a non-contract address registered as a market
/// would.
pub struct BrokenMarket;

impl DebtSource for BrokenMarket {
    fn debt(&self) -> Result<u128, CascadeError> {
        Err(CascadeError::ExternalRead)
    }
}
