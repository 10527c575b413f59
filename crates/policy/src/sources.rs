//! The market registry and debt-source plumbing.

use std::cell::RefCell;
use std::rc::Rc;

use cascade_common::{CascadeError, DebtSource, MarketId};

/// A registered market.
pub struct MarketEntry {
    pub id: MarketId,
    pub source: Rc<dyn DebtSource>,
    pub debt_ceiling: u128,
}

/// Ordered registry of markets. Registration is append-only; ids are dense
/// and double as enumeration order.
#[derive(Default)]
pub struct Factory {
    markets: Vec<MarketEntry>,
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a market and return its id.
    pub fn add_market(&mut self, source: Rc<dyn DebtSource>, debt_ceiling: u128) -> MarketId {
        let id = self.markets.len() as MarketId;
        self.markets.push(MarketEntry {
            id,
            source,
            debt_ceiling,
        });
        log::debug!("add_market id={id} ceiling={debt_ceiling}");
        id
    }

    pub fn market_count(&self) -> usize {
        self.markets.len()
    }

    /// Id of the `i`-th registered market.
    pub fn controllers(&self, i: usize) -> Result<MarketId, CascadeError> {
        self.markets
            .get(i)
            .map(|m| m.id)
            .ok_or(CascadeError::ExternalRead)
    }

    pub fn market_ids(&self) -> Vec<MarketId> {
        self.markets.iter().map(|m| m.id).collect()
    }

    pub fn debt_ceiling(&self, id: MarketId) -> Result<u128, CascadeError> {
        self.entry(id).map(|m| m.debt_ceiling)
    }

    /// Read one market's debt. Surfaces the market's own failure.
    pub fn read_debt(&self, id: MarketId) -> Result<u128, CascadeError> {
        self.entry(id)?.source.debt()
    }

    /// Aggregate debt across every registered market. Fails if any single
    /// market is unreachable; aggregating callers that want isolation read
    /// per market instead.
    pub fn total_debt(&self) -> Result<u128, CascadeError> {
        let mut total = 0u128;
        for market in &self.markets {
            total += market.source.debt()?;
        }
        Ok(total)
    }

    fn entry(&self, id: MarketId) -> Result<&MarketEntry, CascadeError> {
        self.markets
            .get(id as usize)
            .ok_or(CascadeError::ExternalRead)
    }
}

/// Adapter exposing a shared, interior-mutable engine as a read-only debt
/// source. A borrow conflict reads as an external failure rather than a
/// panic, matching the per-item isolation the aggregation relies on.
pub struct SharedDebtSource<T: DebtSource>(pub Rc<RefCell<T>>);

impl<T: DebtSource> DebtSource for SharedDebtSource<T> {
    fn debt(&self) -> Result<u128, CascadeError> {
        let guard = self
            .0
            .try_borrow()
            .map_err(|_| CascadeError::ExternalRead)?;
        DebtSource::debt(&*guard)
    }
}
