//! Trading between the stable and collateral sides of the band arena.
//!
//! An exchange walks bands outward from the active band, converting each
//! band's contents at its lower price `p_down(n)` with the fee charged on
//! input. The walk is planned first and committed only after the slippage
//! check, so a failed exchange leaves no trace.

use cascade_common::{mul_div_down, mul_div_up, CascadeError, WAD};

use crate::state::BandAmm;

/// Stable side of an exchange pair.
pub const STABLE: u32 = 0;

/// Collateral side of an exchange pair.
pub const COLLATERAL: u32 = 1;

/// One band's planned fill. `dx`/`dy` are the stable/collateral deltas
/// applied to the band (signs are implied by direction).
#[derive(Debug, Clone, Copy)]
struct Fill {
    n: i32,
    dx: u128,
    dy: u128,
}

struct Plan {
    fills: Vec<Fill>,
    in_used: u128,
    out: u128,
    end_band: i32,
}

impl BandAmm {
    /// Trade `in_amount` of side `i` for side `j`.
    ///
    /// `0 -> 1` sells stable into the arena (collateral out, the active band
    /// walks to higher indices); `1 -> 0` is the reverse. Partial fills are
    /// allowed when liquidity runs out. Fails with `Slippage` when the
    /// output is below `min_amount_out`.
    ///
    /// Returns `(in_used, out)`.
    pub fn exchange(
        &mut self,
        i: u32,
        j: u32,
        in_amount: u128,
        min_amount_out: u128,
    ) -> Result<(u128, u128), CascadeError> {
        if in_amount == 0 {
            return Err(CascadeError::AmountZero);
        }
        let plan = match (i, j) {
            (STABLE, COLLATERAL) => self.plan_stable_in(in_amount)?,
            (COLLATERAL, STABLE) => self.plan_collateral_in(in_amount)?,
            _ => return Err(CascadeError::BandOutOfRange),
        };
        if plan.out < min_amount_out {
            return Err(CascadeError::Slippage);
        }

        let buying_collateral = i == STABLE;
        for fill in &plan.fills {
            let band = self.band_mut(fill.n);
            if buying_collateral {
                band.x += fill.dx;
                band.y -= fill.dy;
            } else {
                band.x -= fill.dx;
                band.y += fill.dy;
            }
        }
        self.set_active_band(plan.end_band);
        log::debug!(
            "exchange {i}->{j} in_used={} out={} active={}",
            plan.in_used,
            plan.out,
            plan.end_band
        );
        Ok((plan.in_used, plan.out))
    }

    /// Net input after the fee.
    fn after_fee(&self, gross: u128) -> Result<u128, CascadeError> {
        mul_div_down(gross, WAD - self.fee(), WAD)
    }

    /// Gross input needed so the net side covers `net`.
    fn before_fee(&self, net: u128) -> Result<u128, CascadeError> {
        mul_div_up(net, WAD, WAD - self.fee())
    }

    /// Stable in, collateral out: consume `y` from bands at increasing `n`.
    fn plan_stable_in(&self, in_amount: u128) -> Result<Plan, CascadeError> {
        let candidates: Vec<i32> = self
            .occupied_bands()
            .range(self.active_band()..)
            .filter(|(_, b)| b.y > 0)
            .map(|(n, _)| *n)
            .collect();

        let mut plan = Plan {
            fills: Vec::new(),
            in_used: 0,
            out: 0,
            end_band: self.active_band(),
        };
        let mut remaining = in_amount;

        for n in candidates {
            if remaining == 0 {
                break;
            }
            let band = self.band(n);
            let price = self.p_down(n)?;
            // stable that buys the whole band at this price
            let x_for_all = mul_div_up(band.y, price, WAD)?;
            let net_remaining = self.after_fee(remaining)?;

            if net_remaining >= x_for_all && x_for_all > 0 {
                let gross = self.before_fee(x_for_all)?.min(remaining);
                plan.fills.push(Fill {
                    n,
                    dx: gross,
                    dy: band.y,
                });
                plan.in_used += gross;
                plan.out += band.y;
                remaining -= gross;
                plan.end_band = n;
            } else {
                let dy = mul_div_down(net_remaining, WAD, price)?;
                if dy == 0 {
                    break;
                }
                plan.fills.push(Fill {
                    n,
                    dx: remaining,
                    dy,
                });
                plan.in_used += remaining;
                plan.out += dy;
                remaining = 0;
                plan.end_band = n;
            }
        }
        Ok(plan)
    }

    /// Collateral in, stable out: consume `x` from bands at decreasing `n`.
    fn plan_collateral_in(&self, in_amount: u128) -> Result<Plan, CascadeError> {
        let candidates: Vec<i32> = self
            .occupied_bands()
            .range(..=self.active_band())
            .rev()
            .filter(|(_, b)| b.x > 0)
            .map(|(n, _)| *n)
            .collect();

        let mut plan = Plan {
            fills: Vec::new(),
            in_used: 0,
            out: 0,
            end_band: self.active_band(),
        };
        let mut remaining = in_amount;

        for n in candidates {
            if remaining == 0 {
                break;
            }
            let band = self.band(n);
            let price = self.p_down(n)?;
            // collateral that buys the whole band's stable at this price
            let y_for_all = mul_div_up(band.x, WAD, price)?;
            let net_remaining = self.after_fee(remaining)?;

            if net_remaining >= y_for_all && y_for_all > 0 {
                let gross = self.before_fee(y_for_all)?.min(remaining);
                plan.fills.push(Fill {
                    n,
                    dx: band.x,
                    dy: gross,
                });
                plan.in_used += gross;
                plan.out += band.x;
                remaining -= gross;
                plan.end_band = n;
            } else {
                let dx = mul_div_down(net_remaining, price, WAD)?;
                if dx == 0 {
                    break;
                }
                plan.fills.push(Fill {
                    n,
                    dx,
                    dy: remaining,
                });
                plan.in_used += remaining;
                plan.out += dx;
                remaining = 0;
                plan.end_band = n;
            }
        }
        Ok(plan)
    }
}
