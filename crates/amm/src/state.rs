//! Band arena and the per-user share ledger.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use cascade_common::{mul_div_down, CascadeError, UserId, WAD};
use cascade_oracle::PriceOracle;

use crate::math::{band_for_price, p_down, p_up, MAX_BAND, MIN_BAND};

/// One price band. `x` is the stable (debt-token) side, `y` the collateral
/// side. Aggregates over every user occupying the band; unsigned by
/// construction, so a band can never hold negative liquidity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub x: u128,
    pub y: u128,
}

/// A user's allocation: the contiguous band range and the share held in each
/// band. Positions are index-addressed; totals are always recomputed from
/// band state.
#[derive(Debug, Clone)]
pub struct UserTicks {
    pub n1: i32,
    pub n2: i32,
    pub shares: Vec<u128>,
}

/// The band AMM.
pub struct BandAmm {
    a: u32,
    base_price: u128,
    fee: u128,
    active_band: i32,
    bands: BTreeMap<i32, Band>,
    total_shares: BTreeMap<i32, u128>,
    users: HashMap<UserId, UserTicks>,
    oracle: Rc<dyn PriceOracle>,
}

impl BandAmm {
    /// Create an empty AMM. The active band starts wherever the oracle
    /// price currently sits.
    pub fn new(
        a: u32,
        base_price: u128,
        fee: u128,
        oracle: Rc<dyn PriceOracle>,
    ) -> Result<Self, CascadeError> {
        if fee >= WAD {
            return Err(CascadeError::Overflow);
        }
        let active_band = band_for_price(a, base_price, oracle.price())?;
        Ok(Self {
            a,
            base_price,
            fee,
            active_band,
            bands: BTreeMap::new(),
            total_shares: BTreeMap::new(),
            users: HashMap::new(),
            oracle,
        })
    }

    pub fn amplification(&self) -> u32 {
        self.a
    }

    pub fn active_band(&self) -> i32 {
        self.active_band
    }

    pub(crate) fn set_active_band(&mut self, n: i32) {
        self.active_band = n;
    }

    pub fn fee(&self) -> u128 {
        self.fee
    }

    /// Admin hook: replace the exchange fee.
    pub fn set_fee(&mut self, fee: u128) -> Result<(), CascadeError> {
        if fee >= WAD {
            return Err(CascadeError::Overflow);
        }
        self.fee = fee;
        Ok(())
    }

    pub fn oracle(&self) -> &Rc<dyn PriceOracle> {
        &self.oracle
    }

    pub fn price_oracle(&self) -> u128 {
        self.oracle.price()
    }

    /// Upper price of band `n`.
    pub fn p_up(&self, n: i32) -> Result<u128, CascadeError> {
        p_up(self.a, self.base_price, n)
    }

    /// Lower price of band `n`.
    pub fn p_down(&self, n: i32) -> Result<u128, CascadeError> {
        p_down(self.a, self.base_price, n)
    }

    /// Band containing `price`.
    pub fn band_for_price(&self, price: u128) -> Result<i32, CascadeError> {
        band_for_price(self.a, self.base_price, price)
    }

    /// Contents of band `n` (zero if untouched).
    pub fn band(&self, n: i32) -> Band {
        self.bands.get(&n).copied().unwrap_or_default()
    }

    pub(crate) fn band_mut(&mut self, n: i32) -> &mut Band {
        self.bands.entry(n).or_default()
    }

    pub(crate) fn occupied_bands(&self) -> &BTreeMap<i32, Band> {
        &self.bands
    }

    pub fn has_deposit(&self, user: UserId) -> bool {
        self.users.contains_key(&user)
    }

    /// The user's band range `(n1, n2)`.
    pub fn read_user_tick_numbers(&self, user: UserId) -> Result<(i32, i32), CascadeError> {
        let ticks = self.users.get(&user).ok_or(CascadeError::NoDeposit)?;
        Ok((ticks.n1, ticks.n2))
    }

    /// Spread `collateral` equally over bands `[n1, n2]` for `user`.
    ///
    /// The range must sit strictly below the active band (deposits are
    /// collateral waiting to be traded through, never instantly tradable).
    /// The division remainder lands in the last band so the sum is exact.
    pub fn deposit_range(
        &mut self,
        user: UserId,
        collateral: u128,
        n1: i32,
        n2: i32,
    ) -> Result<(), CascadeError> {
        if collateral == 0 {
            return Err(CascadeError::AmountZero);
        }
        if self.users.contains_key(&user) {
            return Err(CascadeError::DepositExists);
        }
        if n1 > n2 || n1 < MIN_BAND || n2 > MAX_BAND {
            return Err(CascadeError::BandOutOfRange);
        }
        if n1 <= self.active_band {
            return Err(CascadeError::DepositBelowBand);
        }

        let n_bands = (n2 - n1 + 1) as u128;
        let per_band = collateral / n_bands;
        if per_band == 0 {
            return Err(CascadeError::AmountZero);
        }

        let mut shares = Vec::with_capacity(n_bands as usize);
        for n in n1..=n2 {
            let dy = if n == n2 {
                collateral - per_band * (n_bands - 1)
            } else {
                per_band
            };
            let total = self.total_shares.get(&n).copied().unwrap_or(0);
            let band = self.bands.entry(n).or_default();
            let minted = if total == 0 || band.y == 0 {
                dy
            } else {
                mul_div_down(dy, total, band.y)?
            };
            band.y += dy;
            *self.total_shares.entry(n).or_insert(0) = total + minted;
            shares.push(minted);
        }

        log::debug!("deposit user={user} range=[{n1},{n2}] collateral={collateral}");
        self.users.insert(user, UserTicks { n1, n2, shares });
        Ok(())
    }

    /// Amounts a `frac` (WAD) withdrawal would remove from band `n` for this
    /// user: `(shares_burned, x_out, y_out)`. Shared by previews and commits
    /// so the two can never disagree.
    fn band_take(
        &self,
        ticks: &UserTicks,
        idx: usize,
        n: i32,
        frac: u128,
    ) -> Result<(u128, u128, u128), CascadeError> {
        let user_shares = ticks.shares[idx];
        let take = if frac == WAD {
            user_shares
        } else {
            mul_div_down(user_shares, frac, WAD)?
        };
        if take == 0 {
            return Ok((0, 0, 0));
        }
        let total = self.total_shares.get(&n).copied().unwrap_or(0);
        if total == 0 {
            return Ok((0, 0, 0));
        }
        let band = self.band(n);
        let dx = mul_div_down(band.x, take, total)?;
        let dy = mul_div_down(band.y, take, total)?;
        Ok((take, dx, dy))
    }

    /// Aggregate `(x, y)` attributed to the user across their bands.
    pub fn get_sum_xy(&self, user: UserId) -> Result<(u128, u128), CascadeError> {
        self.get_frac_xy(user, WAD)
    }

    /// `(x, y)` a `frac` withdrawal would return, without committing it.
    pub fn get_frac_xy(&self, user: UserId, frac: u128) -> Result<(u128, u128), CascadeError> {
        let ticks = self.users.get(&user).ok_or(CascadeError::NoDeposit)?;
        let mut x = 0u128;
        let mut y = 0u128;
        for (idx, n) in (ticks.n1..=ticks.n2).enumerate() {
            let (_, dx, dy) = self.band_take(ticks, idx, n, frac)?;
            x += dx;
            y += dy;
        }
        Ok((x, y))
    }

    /// Conservative stable-denominated value of the user's position: stable
    /// as-is, collateral at the lower edge of its band. This is exactly what
    /// a full downward conversion realizes, so it is the liquidation payoff
    /// basis.
    pub fn get_x_down(&self, user: UserId) -> Result<u128, CascadeError> {
        let ticks = self.users.get(&user).ok_or(CascadeError::NoDeposit)?;
        let mut value = 0u128;
        for (idx, n) in (ticks.n1..=ticks.n2).enumerate() {
            let (_, dx, dy) = self.band_take(ticks, idx, n, WAD)?;
            value += dx;
            value += mul_div_down(dy, self.p_down(n)?, WAD)?;
        }
        Ok(value)
    }

    /// Remove `frac` (WAD) of the user's shares from every band.
    ///
    /// Returns the withdrawn `(x, y)`. A full withdrawal clears the user's
    /// record; rounding dust stays in the pool.
    pub fn withdraw(&mut self, user: UserId, frac: u128) -> Result<(u128, u128), CascadeError> {
        if frac == 0 || frac > WAD {
            return Err(CascadeError::AmountZero);
        }
        let ticks = self.users.get(&user).ok_or(CascadeError::NoDeposit)?.clone();

        let mut x = 0u128;
        let mut y = 0u128;
        let mut remaining = ticks.clone();
        for (idx, n) in (ticks.n1..=ticks.n2).enumerate() {
            let (take, dx, dy) = self.band_take(&ticks, idx, n, frac)?;
            if take == 0 {
                continue;
            }
            let band = self.bands.entry(n).or_default();
            band.x -= dx;
            band.y -= dy;
            if let Some(total) = self.total_shares.get_mut(&n) {
                *total -= take;
                if *total == 0 {
                    self.total_shares.remove(&n);
                }
            }
            remaining.shares[idx] -= take;
            x += dx;
            y += dy;
        }

        if frac == WAD {
            self.users.remove(&user);
        } else {
            self.users.insert(user, remaining);
        }
        log::debug!("withdraw user={user} frac={frac} x={x} y={y}");
        Ok((x, y))
    }
}
