//! Price feeds consumed by the AMM and the monetary policy.
//!
//! The engine treats oracles as read-only collaborators. Time never comes
//! from a system clock: `price_w` takes the caller's timestamp so smoothing
//! is a pure function of `(last_state, now)`.

use std::cell::Cell;

use cascade_common::{mul_div_down, w_exp, Timestamp, WAD};

/// A collateral price feed, WAD-scaled.
pub trait PriceOracle {
    /// Current spot price.
    fn price(&self) -> u128;

    /// Smoothed price, advanced to `now`. Used where a manipulated spot
    /// reading must not move the protocol instantly.
    fn price_w(&self, now: Timestamp) -> u128;
}

/// Fixed, settable price. Both reads return the same value.
pub struct StaticOracle {
    price: Cell<u128>,
}

impl StaticOracle {
    pub fn new(price: u128) -> Self {
        Self {
            price: Cell::new(price),
        }
    }

    pub fn set_price(&self, price: u128) {
        self.price.set(price);
    }
}

impl PriceOracle for StaticOracle {
    fn price(&self) -> u128 {
        self.price.get()
    }

    fn price_w(&self, _now: Timestamp) -> u128 {
        self.price.get()
    }
}

/// Spot price plus an exponential moving average with time constant `tau`.
///
/// The EMA is advanced lazily: each `set_price` folds the elapsed interval
/// into the average, and `price_w` decays the stored average toward the
/// current spot without mutating more than the smoothing state.
pub struct EmaOracle {
    spot: Cell<u128>,
    ema: Cell<u128>,
    updated_at: Cell<Timestamp>,
    tau: u64,
}

impl EmaOracle {
    pub fn new(price: u128, tau: u64, now: Timestamp) -> Self {
        Self {
            spot: Cell::new(price),
            ema: Cell::new(price),
            updated_at: Cell::new(now),
            tau: tau.max(1),
        }
    }

    /// Record a new spot observation at `now`.
    pub fn set_price(&self, price: u128, now: Timestamp) {
        let smoothed = self.smoothed(now);
        self.ema.set(smoothed);
        self.spot.set(price);
        self.updated_at.set(now);
    }

    fn smoothed(&self, now: Timestamp) -> u128 {
        let spot = self.spot.get();
        let ema = self.ema.get();
        let dt = now.saturating_sub(self.updated_at.get());
        if dt == 0 || spot == ema {
            return ema;
        }
        // decay = exp(-dt / tau), WAD-scaled; decay <= WAD so the product
        // can never leave u128
        let decay = w_exp(-((dt as i128) * WAD as i128 / self.tau as i128));
        let keep = |diff: u128| mul_div_down(diff, decay, WAD).unwrap_or(diff);
        if spot > ema {
            spot - keep(spot - ema)
        } else {
            spot + keep(ema - spot)
        }
    }
}

impl PriceOracle for EmaOracle {
    fn price(&self) -> u128 {
        self.spot.get()
    }

    fn price_w(&self, now: Timestamp) -> u128 {
        self.smoothed(now)
    }
}
