//! Bailey-Borwein-Plouffe digit extraction.
//!
//! The hex digit of pi at position `d` (with `d = 0` the leading `3`) is
//!
//! ```text
//! floor(16 * frac(4*S(d,1) - 2*S(d,4) - S(d,5) - S(d,6)))
//! ```
//!
//! where
//!
//! ```text
//! S(d,c) = sum_{k=0}^{d-1} (16^(d-1-k) mod (8k+c)) / (8k+c)
//!        + sum_{k=d}^{inf} 16^(d-1-k) / (8k+c)
//! ```
//!
//! The head of the series uses exact modular exponentiation. The tail is summed
//! until adding the next term leaves the total unchanged.

use crate::{
    error::{Error, Result},
    types::DigitPosition,
};

/// Largest integer `f64` represents exactly (`2^53 - 1`).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Computes the hexadecimal digit of pi at a given position.
///
/// Implementations must be pure: the same position always yields the same
/// digit. The worker pool is generic over this trait so that alternative
/// engines can be injected.
pub trait DigitEngine: Send + Sync + 'static {
    /// Returns the lowercase hex digit at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DigitOverflow`] if the digit cannot be computed safely.
    fn digit_at(&self, position: DigitPosition) -> Result<char>;
}

/// The BBP spigot engine backed by `f64` arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bbp;

impl DigitEngine for Bbp {
    fn digit_at(&self, position: DigitPosition) -> Result<char> {
        let s = 4.0 * series(position, 1)?
            - 2.0 * series(position, 4)?
            - series(position, 5)?
            - series(position, 6)?;

        // frac(s) < 1, but clamp anyway so a rounding artefact can't index
        // past 'f'.
        let nibble = ((frac(s) * 16.0).floor() as usize).min(15);
        Ok(HEX_DIGITS[nibble] as char)
    }
}

/// Evaluates `S(d, c)` for the BBP formula.
///
/// # Errors
///
/// Returns [`Error::DigitOverflow`] if `8k + c` overflows `u64` or a partial
/// sum of the head exceeds [`MAX_SAFE_INTEGER`].
pub fn series(d: DigitPosition, c: u64) -> Result<f64> {
    let overflow = || Error::DigitOverflow { position: d };
    // Largest head denominator is below 8d + c, where the tail starts.
    d.checked_mul(8)
        .and_then(|v| v.checked_add(c))
        .ok_or_else(overflow)?;

    let mut sum = 0.0_f64;

    for k in 0..d {
        let denom = 8 * k + c;
        sum += mod_pow(16, d - 1 - k, denom) as f64 / denom as f64;
        if sum.abs() > MAX_SAFE_INTEGER {
            return Err(overflow());
        }
    }

    // 16^(d-1-k) for k = d, d+1, ... Division by 16 is exact in binary.
    let mut power = 1.0 / 16.0;
    let mut k = d;
    loop {
        let denom = k
            .checked_mul(8)
            .and_then(|v| v.checked_add(c))
            .ok_or_else(overflow)?;
        let next = sum + power / denom as f64;
        if next == sum {
            break;
        }
        sum = next;
        power /= 16.0;
        k += 1;
    }

    Ok(sum)
}

/// Computes `base^exp mod m` by repeated squaring, reducing every step.
///
/// Returns `0` when `m == 1`. Intermediates are widened to `u128`, so any
/// `u64` modulus is safe.
pub fn mod_pow(base: u64, mut exp: u64, m: u64) -> u64 {
    if m == 1 {
        return 0;
    }
    let m = u128::from(m);
    let mut result: u128 = 1;
    let mut base = u128::from(base) % m;

    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % m;
        }
        base = base * base % m;
        exp >>= 1;
    }

    result as u64
}

/// Fractional part using floor semantics, so negative inputs map into
/// `[0, 1)`.
pub fn frac(x: f64) -> f64 {
    x - x.floor()
}
