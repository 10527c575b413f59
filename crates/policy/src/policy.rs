//! The aggregate monetary policy.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use cascade_common::{
    mul_div_down, w_div_down, w_exp, w_mul_down, CascadeError, DebtSource, MarketId, Timestamp,
    WAD,
};
use cascade_oracle::PriceOracle;

use crate::candle::DebtCandle;
use crate::sources::Factory;

/// Per-second rate ceiling (~300% APY).
pub const MAX_RATE: u128 = 43_959_106_799;

/// Clamp on the exponent feeding the rate law; keeps `rate0 * exp(power)`
/// far away from the representable edge before the `MAX_RATE` cap applies.
const MAX_POWER: i128 = 20 * WAD as i128;

/// Computes the per-second borrow rate from a base rate, the stablecoin
/// price, and the share of protocol debt carried by stabilization pools.
pub struct MonetaryPolicy {
    oracle: Rc<dyn PriceOracle>,
    factory: Rc<RefCell<Factory>>,
    peg_keepers: Vec<Rc<dyn DebtSource>>,
    rate0: u128,
    sigma: u128,
    target_debt_fraction: u128,
    candles: HashMap<MarketId, DebtCandle>,
    cached_rate: u128,
}

impl MonetaryPolicy {
    pub fn new(
        oracle: Rc<dyn PriceOracle>,
        factory: Rc<RefCell<Factory>>,
        peg_keepers: Vec<Rc<dyn DebtSource>>,
        rate0: u128,
        sigma: u128,
        target_debt_fraction: u128,
    ) -> Result<Self, CascadeError> {
        if sigma == 0 || target_debt_fraction == 0 {
            return Err(CascadeError::AmountZero);
        }
        if rate0 > MAX_RATE {
            return Err(CascadeError::Overflow);
        }
        Ok(Self {
            oracle,
            factory,
            peg_keepers,
            rate0,
            sigma,
            target_debt_fraction,
            candles: HashMap::new(),
            cached_rate: rate0,
        })
    }

    /// The cached rate. Pure read; equals the freshly computed rate
    /// immediately after a successful `rate_write`.
    pub fn rate(&self) -> u128 {
        self.cached_rate
    }

    /// Refresh the debt candle for one market (or all of them), then
    /// recompute and cache the rate.
    ///
    /// A market whose read fails is skipped: its candle — and therefore its
    /// contribution to the aggregate — is left exactly as it was, and the
    /// write still succeeds. Peg-keeper reads get the same isolation.
    pub fn rate_write(
        &mut self,
        target: Option<MarketId>,
        now: Timestamp,
    ) -> Result<u128, CascadeError> {
        let ids = match target {
            Some(id) => vec![id],
            None => self.factory.borrow().market_ids(),
        };
        for id in ids {
            match self.factory.borrow().read_debt(id) {
                Ok(reading) => {
                    let candle = match self.candles.get(&id) {
                        Some(c) => c.roll(reading, now),
                        None => DebtCandle::snap(reading, now),
                    };
                    self.candles.insert(id, candle);
                }
                Err(err) => {
                    log::debug!("rate_write: skipping market {id}: {err}");
                }
            }
        }

        let price = self.oracle.price_w(now);
        let pk_debt = self.peg_keeper_debt();
        let total = self.estimated_total(now);
        let rate = self.calculate_rate(price, pk_debt, total)?;
        self.cached_rate = rate;
        log::debug!("rate_write: price={price} pk_debt={pk_debt} total={total} rate={rate}");
        Ok(rate)
    }

    /// `(total_estimate, for_market)` debt estimates at `now`.
    ///
    /// With `use_cache` the result is a pure function of candle state and
    /// the clock; without it the market is re-read (surfacing a failure) and
    /// the estimate previews the roll a `rate_write` would commit. The two
    /// agree exactly immediately after a write.
    pub fn read_debt(
        &self,
        market: MarketId,
        use_cache: bool,
        now: Timestamp,
    ) -> Result<(u128, u128), CascadeError> {
        let for_market = if use_cache {
            self.candles.get(&market).map(|c| c.value(now)).unwrap_or(0)
        } else {
            let reading = self.factory.borrow().read_debt(market)?;
            match self.candles.get(&market) {
                // rolling never moves the estimate, only the target
                Some(c) => c.value(now),
                None => reading,
            }
        };

        let mut total = for_market;
        for id in self.factory.borrow().market_ids() {
            if id == market {
                continue;
            }
            if let Some(c) = self.candles.get(&id) {
                total += c.value(now);
            }
        }
        Ok((total, for_market))
    }

    fn estimated_total(&self, now: Timestamp) -> u128 {
        self.factory
            .borrow()
            .market_ids()
            .iter()
            .filter_map(|id| self.candles.get(id))
            .map(|c| c.value(now))
            .sum()
    }

    fn peg_keeper_debt(&self) -> u128 {
        self.peg_keepers
            .iter()
            .filter_map(|pk| pk.debt().ok())
            .sum()
    }

    /// `rate = min(rate0 · exp(power), MAX_RATE)` with
    /// `power = (1 - p)/sigma - (pk_debt/total)/target_debt_fraction`.
    ///
    /// A depegged-low price or a drained stabilization pool raises the
    /// rate; pools sitting on a large share of total debt (stable trading
    /// high) lower it.
    fn calculate_rate(
        &self,
        price: u128,
        pk_debt: u128,
        total_debt: u128,
    ) -> Result<u128, CascadeError> {
        let mut power =
            (WAD as i128 - price as i128).saturating_mul(WAD as i128) / self.sigma as i128;
        if pk_debt > 0 && total_debt > 0 {
            let fraction = w_div_down(pk_debt, total_debt)?;
            power -= mul_div_down(fraction, WAD, self.target_debt_fraction)? as i128;
        }
        let rate = w_mul_down(self.rate0, w_exp(power.min(MAX_POWER)))?;
        Ok(rate.min(MAX_RATE))
    }
}
