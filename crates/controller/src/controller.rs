//! The market controller.

use std::collections::HashMap;
use std::rc::Rc;

use cascade_amm::BandAmm;
use cascade_common::{
    mul_div_down, mul_div_up, w_div_up, w_mul_down, CascadeError, DebtSource, Timestamp, UserId,
    WAD,
};
use cascade_oracle::PriceOracle;

use crate::callback::LiquidationCallback;
use crate::loan::{LiquidationOutcome, Loan, RepayOutcome};

/// Fewest bands a loan may span.
pub const MIN_BANDS: i32 = 5;

/// Most bands a loan may span.
pub const MAX_BANDS: i32 = 50;

/// Market parameters fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct ControllerParams {
    /// AMM amplification.
    pub a: u32,
    /// AMM base price (upper price of band 0).
    pub base_price: u128,
    /// AMM exchange fee, WAD fraction.
    pub amm_fee: u128,
    /// Safety margin applied when sizing loans, WAD fraction.
    pub loan_discount: u128,
    /// Safety margin applied when judging solvency, WAD fraction.
    pub liquidation_discount: u128,
    /// Initial per-second borrow rate, WAD-scaled.
    pub rate: u128,
}

/// Loan lifecycle, health and liquidation on top of the band AMM.
pub struct Controller {
    amm: BandAmm,
    oracle: Rc<dyn PriceOracle>,
    loans: HashMap<UserId, Loan>,
    loan_discount: u128,
    liquidation_discount: u128,
    /// Aggregate debt at the last checkpoint.
    total_debt: u128,
    /// Per-second borrow rate, WAD-scaled.
    rate: u128,
    /// Monotone interest multiplier.
    rate_mul: u128,
    /// Time of the last checkpoint.
    rate_time: Timestamp,
    /// Debt ever created (loans + realized fees).
    minted: u128,
    /// Debt ever retired (repayments + liquidations).
    redeemed: u128,
}

impl Controller {
    pub fn new(
        params: ControllerParams,
        oracle: Rc<dyn PriceOracle>,
        now: Timestamp,
    ) -> Result<Self, CascadeError> {
        if params.loan_discount >= WAD || params.liquidation_discount >= WAD {
            return Err(CascadeError::Overflow);
        }
        let amm = BandAmm::new(params.a, params.base_price, params.amm_fee, oracle.clone())?;
        Ok(Self {
            amm,
            oracle,
            loans: HashMap::new(),
            loan_discount: params.loan_discount,
            liquidation_discount: params.liquidation_discount,
            total_debt: 0,
            rate: params.rate,
            rate_mul: WAD,
            rate_time: now,
            minted: 0,
            redeemed: 0,
        })
    }

    pub fn amm(&self) -> &BandAmm {
        &self.amm
    }

    /// Mutable AMM access for traders (and tests) driving exchanges.
    pub fn amm_mut(&mut self) -> &mut BandAmm {
        &mut self.amm
    }

    pub fn loan_discount(&self) -> u128 {
        self.loan_discount
    }

    pub fn liquidation_discount(&self) -> u128 {
        self.liquidation_discount
    }

    pub fn rate(&self) -> u128 {
        self.rate
    }

    pub fn set_amm_fee(&mut self, fee: u128) -> Result<(), CascadeError> {
        self.amm.set_fee(fee)
    }

    // ---- interest -------------------------------------------------------

    /// Interest multiplier advanced to `now` without committing it.
    fn rate_mul_at(&self, now: Timestamp) -> Result<u128, CascadeError> {
        if now <= self.rate_time {
            return Ok(self.rate_mul);
        }
        let dt = (now - self.rate_time) as u128;
        let factor = WAD
            .checked_add(self.rate.checked_mul(dt).ok_or(CascadeError::Overflow)?)
            .ok_or(CascadeError::Overflow)?;
        w_mul_down(self.rate_mul, factor)
    }

    /// Fold elapsed time into `rate_mul` and scale the aggregate debt with
    /// it. Idempotent for a constant `now`.
    fn checkpoint(&mut self, now: Timestamp) -> Result<(), CascadeError> {
        let new_mul = self.rate_mul_at(now)?;
        if new_mul != self.rate_mul {
            self.total_debt = mul_div_up(self.total_debt, new_mul, self.rate_mul)?;
            self.rate_mul = new_mul;
        }
        if now > self.rate_time {
            self.rate_time = now;
        }
        Ok(())
    }

    /// Replace the borrow rate, accruing the old one up to `now` first.
    /// Driven by whoever runs the monetary policy.
    pub fn set_rate(&mut self, rate: u128, now: Timestamp) -> Result<(), CascadeError> {
        self.checkpoint(now)?;
        self.rate = rate;
        Ok(())
    }

    /// Outstanding debt of `user` at `now`.
    pub fn debt(&self, user: UserId, now: Timestamp) -> Result<u128, CascadeError> {
        let loan = self.loans.get(&user).ok_or(CascadeError::NoLoan)?;
        self.loan_debt(loan, now)
    }

    fn loan_debt(&self, loan: &Loan, now: Timestamp) -> Result<u128, CascadeError> {
        mul_div_up(loan.debt, self.rate_mul_at(now)?, loan.rate_mul_snapshot)
    }

    /// Aggregate outstanding debt at `now`.
    pub fn total_debt(&self, now: Timestamp) -> Result<u128, CascadeError> {
        mul_div_up(self.total_debt, self.rate_mul_at(now)?, self.rate_mul)
    }

    pub fn loan_exists(&self, user: UserId) -> bool {
        self.loans.contains_key(&user)
    }

    pub fn n_loans(&self) -> usize {
        self.loans.len()
    }

    // ---- loan sizing ----------------------------------------------------

    /// Stable value of `collateral` spread over bands `[n1, n1+n_bands)`,
    /// valued at each band's lower price — the same split `deposit_range`
    /// commits.
    fn range_value(
        &self,
        collateral: u128,
        n1: i32,
        n_bands: i32,
    ) -> Result<u128, CascadeError> {
        let per_band = collateral / n_bands as u128;
        let last = collateral - per_band * (n_bands as u128 - 1);
        let mut value = 0u128;
        for k in 0..n_bands {
            let amount = if k == n_bands - 1 { last } else { per_band };
            value += w_mul_down(amount, self.amm.p_down(n1 + k)?)?;
        }
        Ok(value)
    }

    fn check_n_bands(n_bands: i32) -> Result<(), CascadeError> {
        if n_bands < MIN_BANDS {
            return Err(CascadeError::TooFewBands);
        }
        if n_bands > MAX_BANDS {
            return Err(CascadeError::TooManyBands);
        }
        Ok(())
    }

    /// The exact borrowing ceiling for `collateral` over `n_bands` bands:
    /// the discounted value of the shallowest placement (immediately below
    /// the active band).
    pub fn max_borrowable(&self, collateral: u128, n_bands: i32) -> Result<u128, CascadeError> {
        Self::check_n_bands(n_bands)?;
        let n1 = self.amm.active_band() + 1;
        let value = self.range_value(collateral, n1, n_bands)?;
        w_mul_down(value, WAD - self.loan_discount)
    }

    /// Deepest starting band whose discounted valuation still covers
    /// `debt`. Fails with `DebtTooHigh` when even the shallowest placement
    /// cannot.
    pub fn calculate_debt_n1(
        &self,
        collateral: u128,
        debt: u128,
        n_bands: i32,
    ) -> Result<i32, CascadeError> {
        Self::check_n_bands(n_bands)?;
        if debt == 0 || collateral == 0 {
            return Err(CascadeError::AmountZero);
        }
        let covers = |n1: i32| -> Result<bool, CascadeError> {
            let value = self.range_value(collateral, n1, n_bands)?;
            Ok(w_mul_down(value, WAD - self.loan_discount)? >= debt)
        };

        let mut n1 = self.amm.active_band() + 1;
        if !covers(n1)? {
            return Err(CascadeError::DebtTooHigh);
        }
        while n1 + n_bands + 1 <= cascade_amm::MAX_BAND && covers(n1 + 1)? {
            n1 += 1;
        }
        Ok(n1)
    }

    // ---- lifecycle ------------------------------------------------------

    /// Open a loan. Returns the debt amount minted to the user.
    pub fn create_loan(
        &mut self,
        user: UserId,
        collateral: u128,
        debt: u128,
        n_bands: i32,
        now: Timestamp,
    ) -> Result<u128, CascadeError> {
        Self::check_n_bands(n_bands)?;
        if collateral == 0 || debt == 0 {
            return Err(CascadeError::AmountZero);
        }
        if self.loans.contains_key(&user) {
            return Err(CascadeError::LoanExists);
        }
        self.checkpoint(now)?;

        let n1 = self.calculate_debt_n1(collateral, debt, n_bands)?;
        self.amm
            .deposit_range(user, collateral, n1, n1 + n_bands - 1)?;

        self.loans.insert(
            user,
            Loan {
                debt,
                rate_mul_snapshot: self.rate_mul,
                liquidated_frac: 0,
            },
        );
        self.total_debt += debt;
        self.minted += debt;
        log::debug!("create_loan user={user} collateral={collateral} debt={debt} n1={n1}");
        Ok(debt)
    }

    /// Replace the user's band allocation with `collateral` at the deepest
    /// placement covering `debt`. Shared by every position-modifying op.
    fn reposition(
        &mut self,
        user: UserId,
        collateral: u128,
        debt: u128,
        n_bands: i32,
    ) -> Result<(), CascadeError> {
        let n1 = self.calculate_debt_n1(collateral, debt, n_bands)?;
        self.amm.withdraw(user, WAD)?;
        self.amm
            .deposit_range(user, collateral, n1, n1 + n_bands - 1)
    }

    /// Add collateral to an open loan, shifting its bands deeper (toward
    /// lower prices). Debt is unchanged.
    pub fn add_collateral(
        &mut self,
        user: UserId,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), CascadeError> {
        if amount == 0 {
            return Err(CascadeError::AmountZero);
        }
        self.checkpoint(now)?;
        let loan = self.loans.get(&user).ok_or(CascadeError::NoLoan)?.clone();
        let debt = self.loan_debt(&loan, now)?;

        let (x, y) = self.amm.get_sum_xy(user)?;
        if x > 0 {
            return Err(CascadeError::InSoftLiquidation);
        }
        let (n1, n2) = self.amm.read_user_tick_numbers(user)?;
        self.reposition(user, y + amount, debt, n2 - n1 + 1)?;

        self.touch_loan(user, debt);
        Ok(())
    }

    /// Remove collateral from an open loan, shifting its bands shallower.
    /// Fails when the remainder no longer covers the debt.
    pub fn remove_collateral(
        &mut self,
        user: UserId,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), CascadeError> {
        if amount == 0 {
            return Err(CascadeError::AmountZero);
        }
        self.checkpoint(now)?;
        let loan = self.loans.get(&user).ok_or(CascadeError::NoLoan)?.clone();
        let debt = self.loan_debt(&loan, now)?;

        let (x, y) = self.amm.get_sum_xy(user)?;
        if x > 0 {
            return Err(CascadeError::InSoftLiquidation);
        }
        if amount >= y {
            return Err(CascadeError::InsufficientFunds);
        }
        let (n1, n2) = self.amm.read_user_tick_numbers(user)?;
        self.reposition(user, y - amount, debt, n2 - n1 + 1)?;

        self.touch_loan(user, debt);
        Ok(())
    }

    /// Extend an open loan with more collateral and/or more debt.
    /// Returns the debt amount minted.
    pub fn borrow_more(
        &mut self,
        user: UserId,
        collateral_add: u128,
        debt_add: u128,
        now: Timestamp,
    ) -> Result<u128, CascadeError> {
        if debt_add == 0 {
            return Err(CascadeError::AmountZero);
        }
        self.checkpoint(now)?;
        let loan = self.loans.get(&user).ok_or(CascadeError::NoLoan)?.clone();
        let debt = self.loan_debt(&loan, now)?;

        let (x, y) = self.amm.get_sum_xy(user)?;
        if x > 0 {
            return Err(CascadeError::InSoftLiquidation);
        }
        let new_debt = debt + debt_add;
        let (n1, n2) = self.amm.read_user_tick_numbers(user)?;
        self.reposition(user, y + collateral_add, new_debt, n2 - n1 + 1)?;

        self.touch_loan(user, new_debt);
        self.total_debt += debt_add;
        self.minted += debt_add;
        Ok(debt_add)
    }

    fn touch_loan(&mut self, user: UserId, debt: u128) {
        self.loans.insert(
            user,
            Loan {
                debt,
                rate_mul_snapshot: self.rate_mul,
                liquidated_frac: 0,
            },
        );
    }

    /// Repay up to `amount` of the user's debt. Any amount at or above the
    /// outstanding debt fully closes the loan and returns all collateral.
    pub fn repay(
        &mut self,
        user: UserId,
        amount: u128,
        now: Timestamp,
    ) -> Result<RepayOutcome, CascadeError> {
        if amount == 0 {
            return Err(CascadeError::AmountZero);
        }
        self.checkpoint(now)?;
        let loan = self.loans.get(&user).ok_or(CascadeError::NoLoan)?.clone();
        let debt = self.loan_debt(&loan, now)?;

        if amount >= debt {
            // full close
            let (x, y) = self.amm.withdraw(user, WAD)?;
            self.loans.remove(&user);
            self.total_debt = self.total_debt.saturating_sub(debt);
            self.redeemed += debt;
            log::debug!("repay user={user} closed debt={debt}");
            return Ok(RepayOutcome {
                debt_repaid: debt,
                collateral_returned: y,
                stable_due_from_user: debt.saturating_sub(x),
                stable_refund: x.saturating_sub(debt),
            });
        }

        let remaining = debt - amount;
        let (x, y) = self.amm.get_sum_xy(user)?;
        if x == 0 {
            // healthy position: move the smaller debt deeper
            let (n1, n2) = self.amm.read_user_tick_numbers(user)?;
            self.reposition(user, y, remaining, n2 - n1 + 1)?;
        }
        self.touch_loan(user, remaining);
        self.total_debt = self.total_debt.saturating_sub(amount);
        self.redeemed += amount;
        Ok(RepayOutcome {
            debt_repaid: amount,
            collateral_returned: 0,
            stable_due_from_user: amount,
            stable_refund: 0,
        })
    }

    // ---- solvency -------------------------------------------------------

    /// Solvency score, WAD-scaled and signed. Negative means liquidatable
    /// by anyone.
    ///
    /// The base score values the position at its conservative in-band
    /// composition; `full` also credits collateral value sitting above the
    /// user's top band at the oracle price.
    pub fn health(
        &self,
        user: UserId,
        full: bool,
        now: Timestamp,
    ) -> Result<i128, CascadeError> {
        let loan = self.loans.get(&user).ok_or(CascadeError::NoLoan)?;
        let debt = self.loan_debt(loan, now)?;
        if debt == 0 {
            return Err(CascadeError::NoLoan);
        }
        let x_down = self.amm.get_x_down(user)?;
        let ratio = mul_div_down(x_down, WAD - self.liquidation_discount, debt)?;
        let mut health = ratio as i128 - WAD as i128;

        if full {
            let (n1, _) = self.amm.read_user_tick_numbers(user)?;
            let p_top = self.amm.p_up(n1)?;
            let p_oracle = self.oracle.price();
            if p_oracle > p_top {
                let (_, y) = self.amm.get_sum_xy(user)?;
                let above = w_mul_down(y, p_oracle - p_top)?;
                health += mul_div_down(above, WAD, debt)? as i128;
            }
        }
        Ok(health)
    }

    /// Stable a liquidator must supply to close the position: outstanding
    /// debt minus the stable already sitting in the user's bands.
    pub fn tokens_to_liquidate(&self, user: UserId, now: Timestamp) -> Result<u128, CascadeError> {
        let debt = self.debt(user, now)?;
        let (x, _) = self.amm.get_sum_xy(user)?;
        Ok(debt.saturating_sub(x))
    }

    /// Upper and lower prices of the user's band range.
    pub fn user_prices(&self, user: UserId) -> Result<(u128, u128), CascadeError> {
        let (n1, n2) = self.amm.read_user_tick_numbers(user)?;
        Ok((self.amm.p_up(n1)?, self.amm.p_down(n2)?))
    }

    /// `(stable, collateral, debt, n_bands)` for the user's position.
    pub fn user_state(
        &self,
        user: UserId,
        now: Timestamp,
    ) -> Result<(u128, u128, u128, i32), CascadeError> {
        let debt = self.debt(user, now)?;
        let (x, y) = self.amm.get_sum_xy(user)?;
        let (n1, n2) = self.amm.read_user_tick_numbers(user)?;
        Ok((x, y, debt, n2 - n1 + 1))
    }

    // ---- liquidation ----------------------------------------------------

    /// Fully liquidate `user`. Third parties need negative health; the
    /// owner may always settle their own position this way.
    pub fn liquidate(
        &mut self,
        caller: UserId,
        user: UserId,
        min_x: u128,
        now: Timestamp,
    ) -> Result<LiquidationOutcome, CascadeError> {
        self.liquidate_extended(caller, user, min_x, WAD, None, &[], now)
    }

    /// Liquidate `frac` (WAD fraction of the original position) of `user`,
    /// optionally routing the collateral through a deleverage callback.
    pub fn liquidate_extended(
        &mut self,
        caller: UserId,
        user: UserId,
        min_x: u128,
        frac: u128,
        callback: Option<&mut dyn LiquidationCallback>,
        extra: &[u128],
        now: Timestamp,
    ) -> Result<LiquidationOutcome, CascadeError> {
        let loan = self.loans.get(&user).ok_or(CascadeError::NoLoan)?.clone();
        self.checkpoint(now)?;

        if caller != user && self.health(user, true, now)? >= 0 {
            return Err(CascadeError::NotEligible);
        }

        let remaining = WAD - loan.liquidated_frac;
        let frac_cap = frac.min(remaining);
        if frac_cap == 0 {
            return Err(CascadeError::AmountZero);
        }
        // fraction of the current position that realizes `frac` of the
        // original one
        let mut eff = if frac_cap == remaining {
            WAD
        } else {
            w_div_up(frac_cap, remaining)?
        };

        let debt = self.loan_debt(&loan, now)?;
        let mut debt_portion = if eff == WAD {
            debt
        } else {
            mul_div_up(debt, eff, WAD)?
        };
        if debt_portion >= debt {
            // rounding reached the whole debt: close outright
            eff = WAD;
            debt_portion = debt;
        }

        let (x_f, y_f) = self.amm.get_frac_xy(user, eff)?;
        if x_f < min_x {
            return Err(CascadeError::Slippage);
        }

        let callback_stable = match callback {
            Some(hook) => {
                let resp = hook.on_liquidate(user, x_f, y_f, debt_portion, extra)?;
                if x_f + resp.stablecoins < debt_portion {
                    return Err(CascadeError::CallbackShortfall);
                }
                resp.stablecoins
            }
            None => 0,
        };

        // nothing above mutated the ledger; commit now
        let (x_w, y_w) = self.amm.withdraw(user, eff)?;
        if eff == WAD {
            self.loans.remove(&user);
        } else {
            self.loans.insert(
                user,
                Loan {
                    debt: debt - debt_portion,
                    rate_mul_snapshot: self.rate_mul,
                    liquidated_frac: loan.liquidated_frac + frac_cap,
                },
            );
        }
        self.total_debt = self.total_debt.saturating_sub(debt_portion);
        self.redeemed += debt_portion;

        let recovered = x_w + callback_stable;
        log::debug!(
            "liquidate user={user} frac={frac_cap} debt_portion={debt_portion} x={x_w} y={y_w}"
        );
        Ok(LiquidationOutcome {
            debt_repaid: debt_portion,
            stable_from_amm: x_w,
            collateral_to_caller: y_w,
            stable_due_from_caller: debt_portion.saturating_sub(recovered),
            stable_refund: recovered.saturating_sub(debt_portion),
        })
    }

    // ---- fees -----------------------------------------------------------

    /// Realize accrued interest as protocol fees. Returns the amount owed
    /// to the fee receiver; outstanding user debt is untouched.
    pub fn collect_fees(&mut self, now: Timestamp) -> Result<u128, CascadeError> {
        self.checkpoint(now)?;
        let fees = (self.total_debt + self.redeemed).saturating_sub(self.minted);
        self.minted += fees;
        log::debug!("collect_fees fees={fees}");
        Ok(fees)
    }
}

impl DebtSource for Controller {
    fn debt(&self) -> Result<u128, CascadeError> {
        Ok(self.total_debt)
    }
}
