//! WAD fixed-point arithmetic.
//!
//! Values are `u128` scaled by 1e18; every multiply/divide widens to `U256`
//! so intermediates cannot wrap. Rounding direction is explicit in the
//! function name; callers pick the direction that favors the pool.

use alloy_primitives::U256;

use crate::error::CascadeError;
use crate::types::WAD;

/// ln(2) scaled by WAD.
pub const LN_2_WAD: i128 = 693_147_180_559_945_309;

/// ln(1e-18) scaled by WAD; below this exp(x) rounds to zero.
const EXP_LOWER_BOUND: i128 = -41_446_531_673_892_822_312;

/// Arguments at or above 47.0 saturate (the result would not fit a WAD u128).
const EXP_UPPER_BOUND: i128 = 47_000_000_000_000_000_000;

/// e^47 scaled by WAD, the saturation value.
const EXP_UPPER_VALUE: u128 = 258_131_288_619_951_046_699_120_680_570_000_000_000;

/// floor(a * b / d).
pub fn mul_div_down(a: u128, b: u128, d: u128) -> Result<u128, CascadeError> {
    if d == 0 {
        return Err(CascadeError::Overflow);
    }
    let wide = U256::from(a) * U256::from(b) / U256::from(d);
    u128::try_from(wide).map_err(|_| CascadeError::Overflow)
}

/// ceil(a * b / d).
pub fn mul_div_up(a: u128, b: u128, d: u128) -> Result<u128, CascadeError> {
    if d == 0 {
        return Err(CascadeError::Overflow);
    }
    let num = U256::from(a) * U256::from(b);
    let wide = (num + U256::from(d - 1)) / U256::from(d);
    u128::try_from(wide).map_err(|_| CascadeError::Overflow)
}

/// floor(a * b / WAD).
pub fn w_mul_down(a: u128, b: u128) -> Result<u128, CascadeError> {
    mul_div_down(a, b, WAD)
}

/// ceil(a * b / WAD).
pub fn w_mul_up(a: u128, b: u128) -> Result<u128, CascadeError> {
    mul_div_up(a, b, WAD)
}

/// floor(a * WAD / b).
pub fn w_div_down(a: u128, b: u128) -> Result<u128, CascadeError> {
    mul_div_down(a, WAD, b)
}

/// ceil(a * WAD / b).
pub fn w_div_up(a: u128, b: u128) -> Result<u128, CascadeError> {
    mul_div_up(a, WAD, b)
}

/// Integer power of a WAD-scaled fraction, `ratio^exp`.
///
/// `ratio` must be in (0, WAD]; negative exponents invert the positive power.
/// Exponentiation by squaring with floor rounding at every step, so repeated
/// application never credits more than the closed form.
pub fn pow_ratio(ratio: u128, exp: i32) -> Result<u128, CascadeError> {
    if ratio == 0 || ratio > WAD {
        return Err(CascadeError::Overflow);
    }
    let mut result = WAD;
    let mut base = ratio;
    let mut e = exp.unsigned_abs();
    while e > 0 {
        if e & 1 == 1 {
            result = w_mul_down(result, base)?;
        }
        e >>= 1;
        if e > 0 {
            base = w_mul_down(base, base)?;
        }
    }
    if exp < 0 {
        if result == 0 {
            return Err(CascadeError::Overflow);
        }
        result = mul_div_down(WAD, WAD, result)?;
    }
    Ok(result)
}

/// exp(x) for a WAD-scaled signed argument.
///
/// Decomposes x = q·ln2 + r with |r| <= ln2/2, evaluates e^r with a 6th-order
/// Taylor polynomial and shifts by q. Saturates at e^47 (the largest result a
/// WAD u128 can hold) and rounds to zero below ln(1e-18).
pub fn w_exp(x: i128) -> u128 {
    if x < EXP_LOWER_BOUND {
        return 0;
    }
    if x >= EXP_UPPER_BOUND {
        return EXP_UPPER_VALUE;
    }

    // q = x / ln2 rounded half toward even magnitudes, r the remainder
    let rounding = if x < 0 { -(LN_2_WAD / 2) } else { LN_2_WAD / 2 };
    let q = (x + rounding) / LN_2_WAD;
    let r = x - q * LN_2_WAD;

    // e^r via Taylor to r^6; |r| <= ln2/2 keeps every product inside i128
    let wad = WAD as i128;
    let r2 = r * r / wad;
    let r3 = r2 * r / wad;
    let r4 = r3 * r / wad;
    let r5 = r4 * r / wad;
    let r6 = r5 * r / wad;
    let exp_r = wad + r + r2 / 2 + r3 / 6 + r4 / 24 + r5 / 120 + r6 / 720;
    let exp_r = exp_r.unsigned_abs();

    if q >= 0 {
        exp_r << (q as u32)
    } else {
        exp_r >> ((-q) as u32)
    }
}
