//! Reassembly of digit results into a decimal string.
//!
//! Results arrive grouped by cycle and worker in no particular order. They are
//! sorted by position, checked to cover `0..n` exactly once, and joined into a
//! hexadecimal numeral with the point after the integer digit. That numeral is
//! then converted to base 10 exactly, using arbitrary precision integers, and
//! truncated to `n + 1` characters.

use crate::{
    error::{Error, Result},
    types::DigitResult,
};
use num_bigint::BigUint;

/// Sorts, verifies and assembles the full result.
///
/// # Errors
///
/// Returns [`Error::Assembly`] if `results` does not hold exactly the
/// positions `0..n`.
pub fn assemble(results: Vec<DigitResult>, n: u64) -> Result<String> {
    let numeral = hex_numeral(results, n)?;
    hex_to_decimal(&numeral, n)
}

/// Builds the hexadecimal numeral, e.g. `3.243f6` for `n = 6`.
///
/// The point follows the first digit when `n > 1`.
///
/// # Errors
///
/// Returns [`Error::Assembly`] on a missing, duplicated or out-of-range
/// position.
pub fn hex_numeral(mut results: Vec<DigitResult>, n: u64) -> Result<String> {
    if results.len() as u64 != n {
        return Err(assembly(format!(
            "expected {n} digits, collected {}",
            results.len()
        )));
    }

    results.sort_unstable_by_key(|r| r.position);

    let mut numeral = String::with_capacity(results.len() + 1);
    for (expected, result) in (0_u64..).zip(&results) {
        if result.position != expected {
            return Err(assembly(format!(
                "position {expected} is missing or duplicated"
            )));
        }
        numeral.push(result.digit);
        if expected == 0 && n > 1 {
            numeral.push('.');
        }
    }

    Ok(numeral)
}

/// Converts a hexadecimal numeral to decimal and keeps the first `n + 1`
/// characters.
///
/// At most `n - 1` fractional digits are produced, so the cut is a truncation
/// of the exact expansion. An expansion that terminates early yields a shorter
/// string, with no trailing zeros and no bare point.
///
/// # Errors
///
/// Returns [`Error::Assembly`] if `numeral` is not a valid hexadecimal
/// numeral.
pub fn hex_to_decimal(numeral: &str, n: u64) -> Result<String> {
    let (int_hex, frac_hex) = numeral.split_once('.').unwrap_or((numeral, ""));
    if int_hex.is_empty() {
        return Err(assembly("numeral has no integer digit"));
    }

    let digits = format!("{int_hex}{frac_hex}");
    let value = BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| assembly(format!("invalid hexadecimal numeral {numeral:?}")))?;

    // value / 16^len(frac) is the number; split off the integer part.
    let shift = 4 * frac_hex.len();
    let integer = &value >> shift;
    let mask = (BigUint::from(1_u8) << shift) - 1_u8;
    let mut remainder = value & &mask;

    let wanted = n.saturating_sub(1);
    let mut fraction = String::new();
    while remainder.bits() > 0 && (fraction.len() as u64) < wanted {
        remainder *= 10_u8;
        let digit = (&remainder >> shift)
            .to_u32_digits()
            .first()
            .copied()
            .unwrap_or(0);
        fraction.push(char::from(b'0' + digit as u8));
        remainder &= &mask;
    }

    let rendered = if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{integer}.{fraction}")
    };

    let keep = usize::try_from(n.saturating_add(1)).unwrap_or(usize::MAX);
    Ok(rendered.chars().take(keep).collect())
}

fn assembly(reason: impl Into<String>) -> Error {
    Error::Assembly {
        reason: reason.into(),
    }
}
