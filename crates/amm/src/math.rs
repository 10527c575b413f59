//! Band price math.
//!
//! Band prices are a pure function of the band index: with amplification `A`
//! the per-band ratio is `r = (A-1)/A` and `p_up(n) = base_price * r^n`,
//! `p_down(n) = p_up(n+1)`. Larger `n` means lower price.

use cascade_common::{mul_div_down, pow_ratio, w_div_down, CascadeError, WAD};

/// Lowest supported band index.
pub const MIN_BAND: i32 = -1024;

/// Highest supported band index.
pub const MAX_BAND: i32 = 1024;

/// Per-band price ratio `(A-1)/A`, WAD-scaled.
pub fn band_ratio(a: u32) -> Result<u128, CascadeError> {
    if a < 2 {
        return Err(CascadeError::Overflow);
    }
    Ok((a as u128 - 1) * WAD / a as u128)
}

/// Upper price of band `n`.
pub fn p_up(a: u32, base_price: u128, n: i32) -> Result<u128, CascadeError> {
    if !(MIN_BAND..=MAX_BAND).contains(&n) {
        return Err(CascadeError::BandOutOfRange);
    }
    mul_div_down(base_price, pow_ratio(band_ratio(a)?, n)?, WAD)
}

/// Lower price of band `n` (the upper price of the band below).
pub fn p_down(a: u32, base_price: u128, n: i32) -> Result<u128, CascadeError> {
    p_up(a, base_price, n + 1)
}

/// The band whose price interval `(p_down(n), p_up(n)]` contains `price`.
pub fn band_for_price(a: u32, base_price: u128, price: u128) -> Result<i32, CascadeError> {
    if price == 0 {
        return Err(CascadeError::AmountZero);
    }
    let ratio = band_ratio(a)?;
    let mut n = 0i32;
    if price > base_price {
        // walk toward higher prices (lower n)
        let mut p = base_price;
        while p < price {
            if n == MIN_BAND {
                return Err(CascadeError::BandOutOfRange);
            }
            n -= 1;
            p = w_div_down(p, ratio)?;
        }
        Ok(n)
    } else {
        // walk toward lower prices until the band below no longer holds price
        let mut p_next = mul_div_down(base_price, ratio, WAD)?;
        while p_next >= price {
            if n == MAX_BAND {
                return Err(CascadeError::BandOutOfRange);
            }
            n += 1;
            p_next = mul_div_down(p_next, ratio, WAD)?;
        }
        Ok(n)
    }
}
