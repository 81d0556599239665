use bson::Bson;
use std::cmp::Ordering;

/// Numeric view over the three arithmetic BSON subtypes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int32(i32),
    Int64(i64),
    Double(f64),
}

/// Integer result out of range for the widest integer subtype involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

// 2^63 is exactly representable as a double.
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

impl Number {
    #[must_use]
    pub fn from_bson(v: &Bson) -> Option<Self> {
        match v {
            Bson::Int32(i) => Some(Self::Int32(*i)),
            Bson::Int64(i) => Some(Self::Int64(*i)),
            Bson::Double(f) => Some(Self::Double(*f)),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_bson(self) -> Bson {
        match self {
            Self::Int32(i) => Bson::Int32(i),
            Self::Int64(i) => Bson::Int64(i),
            Self::Double(f) => Bson::Double(f),
        }
    }

    #[must_use]
    pub fn is_nan(self) -> bool {
        matches!(self, Self::Double(f) if f.is_nan())
    }

    /// Zero of the same subtype.
    #[must_use]
    pub fn zero_like(self) -> Self {
        match self {
            Self::Int32(_) => Self::Int32(0),
            Self::Int64(_) => Self::Int64(0),
            Self::Double(_) => Self::Double(0.0),
        }
    }

    /// Exact mathematical comparison. `None` when either side is NaN.
    #[must_use]
    pub fn cmp_exact(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Double(a), Self::Double(b)) => a.partial_cmp(&b),
            (Self::Double(a), b) => cmp_f64_i64(a, b.as_i64_lossless()?),
            (a, Self::Double(b)) => cmp_f64_i64(b, a.as_i64_lossless()?).map(Ordering::reverse),
            (a, b) => Some(a.as_i64_lossless()?.cmp(&b.as_i64_lossless()?)),
        }
    }

    /// Integer value; `None` for doubles.
    #[must_use]
    pub fn as_i64_lossless(self) -> Option<i64> {
        match self {
            Self::Int32(i) => Some(i64::from(i)),
            Self::Int64(i) => Some(i),
            Self::Double(_) => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int32(i) => f64::from(i),
            Self::Int64(i) => i as f64,
            Self::Double(f) => f,
        }
    }

    /// Sum with MongoDB promotion: int+int widens to long on overflow,
    /// long overflow is an error, anything with a double is a double.
    ///
    /// # Errors
    /// Returns `Overflow` when a 64-bit integer result does not fit.
    pub fn checked_add(self, other: Self) -> Result<Self, Overflow> {
        match (self, other) {
            (Self::Int32(a), Self::Int32(b)) => Ok(a
                .checked_add(b)
                .map_or_else(|| Self::Int64(i64::from(a) + i64::from(b)), Self::Int32)),
            (Self::Double(_), _) | (_, Self::Double(_)) => Ok(Self::Double(self.as_f64() + other.as_f64())),
            (a, b) => {
                let (a, b) = (a.as_i64_lossless().ok_or(Overflow)?, b.as_i64_lossless().ok_or(Overflow)?);
                a.checked_add(b).map(Self::Int64).ok_or(Overflow)
            }
        }
    }

    /// Product with the same promotion rules as [`Number::checked_add`].
    ///
    /// # Errors
    /// Returns `Overflow` when a 64-bit integer result does not fit.
    pub fn checked_mul(self, other: Self) -> Result<Self, Overflow> {
        match (self, other) {
            (Self::Int32(a), Self::Int32(b)) => Ok(a
                .checked_mul(b)
                .map_or_else(|| Self::Int64(i64::from(a) * i64::from(b)), Self::Int32)),
            (Self::Double(_), _) | (_, Self::Double(_)) => Ok(Self::Double(self.as_f64() * other.as_f64())),
            (a, b) => {
                let (a, b) = (a.as_i64_lossless().ok_or(Overflow)?, b.as_i64_lossless().ok_or(Overflow)?);
                a.checked_mul(b).map(Self::Int64).ok_or(Overflow)
            }
        }
    }

    #[must_use]
    pub fn is_infinite(self) -> bool {
        matches!(self, Self::Double(f) if f.is_infinite())
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        match self {
            Self::Int32(i) => i == 0,
            Self::Int64(i) => i == 0,
            Self::Double(f) => f == 0.0,
        }
    }
}

/// Compares a double with an integer without rounding the integer to a double.
#[allow(clippy::cast_possible_truncation)]
fn cmp_f64_i64(f: f64, i: i64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    if f < -TWO_POW_63 {
        return Some(Ordering::Less);
    }
    let whole = f.trunc();
    // |whole| < 2^63, so the cast is exact
    match (whole as i64).cmp(&i) {
        Ordering::Equal => (f - whole).partial_cmp(&0.0),
        other => Some(other),
    }
}
