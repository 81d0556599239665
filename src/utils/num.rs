//! Numeric utilities: safe and centralized integer conversions.
//!
//! Guidelines
//! - Prefer fallible conversions (returning Option<T>) when a value out of range should stop the operation (e.g., an array index).
//! - Prefer saturating conversions when clamping is safer than panicking or truncating (e.g., sizes reported in logs).
//! - Keep whole-number parsing of BSON operands here so every operator reports the same failure kinds.

use bson::Bson;

// 2^63 as a double; every double in [-2^63, 2^63) truncates to an exact i64.
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

#[inline]
#[must_use]
pub fn i64_to_usize(v: i64) -> Option<usize> {
    usize::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn usize_to_i64(v: usize) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[inline]
#[must_use]
pub fn u64_to_usize(v: u64) -> Option<usize> {
    usize::try_from(v).ok()
}

/// Truncates a finite double towards zero if the result fits in an i64.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f64_trunc_to_i64(v: f64) -> Option<i64> {
    if !v.is_finite() {
        return None;
    }
    let t = v.trunc();
    if (-TWO_POW_63..TWO_POW_63).contains(&t) { Some(t as i64) } else { None }
}

/// Why a BSON operand is not a whole number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WholeNumberError {
    UnexpectedType,
    NotWholeNumber,
    Infinity,
    OutOfRange,
}

/// Reads an operand that must be an integer, accepting doubles without a fractional part.
///
/// # Errors
/// Returns the reason the operand is not usable as an i64.
pub fn whole_number(v: &Bson) -> Result<i64, WholeNumberError> {
    match v {
        Bson::Int32(i) => Ok(i64::from(*i)),
        Bson::Int64(i) => Ok(*i),
        Bson::Double(f) => {
            if f.is_infinite() {
                return Err(WholeNumberError::Infinity);
            }
            if f.is_nan() || f.fract() != 0.0 {
                return Err(WholeNumberError::NotWholeNumber);
            }
            f64_trunc_to_i64(*f).ok_or(WholeNumberError::OutOfRange)
        }
        _ => Err(WholeNumberError::UnexpectedType),
    }
}
