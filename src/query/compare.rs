use bson::{Bson, Document};
use std::cmp::Ordering;

use super::types::{CmpOp, CompareResult};
use crate::document::{Number, TypeBracket};

impl From<Ordering> for CompareResult {
    fn from(o: Ordering) -> Self {
        match o {
            Ordering::Less => Self::Less,
            Ordering::Equal => Self::Equal,
            Ordering::Greater => Self::Greater,
        }
    }
}

/// Compares two values: first by type bracket, then within the bracket.
///
/// NaN is `Equal` to NaN and `Incomparable` to every other number.
#[must_use]
pub fn compare(a: &Bson, b: &Bson) -> CompareResult {
    let (ba, bb) = (TypeBracket::of(a), TypeBracket::of(b));
    if ba != bb {
        return ba.cmp(&bb).into();
    }
    match (a, b) {
        (Bson::Decimal128(x), Bson::Decimal128(y)) => {
            if x.bytes() == y.bytes() { CompareResult::Equal } else { CompareResult::Incomparable }
        }
        (Bson::Decimal128(_), _) | (_, Bson::Decimal128(_)) => CompareResult::Incomparable,
        _ if ba == TypeBracket::Numbers => compare_numbers(a, b),
        (Bson::String(x) | Bson::Symbol(x), Bson::String(y) | Bson::Symbol(y)) => {
            x.as_bytes().cmp(y.as_bytes()).into()
        }
        (Bson::Document(x), Bson::Document(y)) => compare_documents(x, y).into(),
        (Bson::Array(x), Bson::Array(y)) => compare_arrays(x, y).into(),
        (Bson::Binary(x), Bson::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then_with(|| u8::from(x.subtype).cmp(&u8::from(y.subtype)))
            .then_with(|| x.bytes.cmp(&y.bytes))
            .into(),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()).into(),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y).into(),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()).into(),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment)).into()
        }
        (Bson::RegularExpression(x), Bson::RegularExpression(y)) => x
            .pattern
            .as_str()
            .cmp(y.pattern.as_str())
            .then_with(|| x.options.as_str().cmp(y.options.as_str()))
            .into(),
        (Bson::JavaScriptCode(x), Bson::JavaScriptCode(y)) => x.cmp(y).into(),
        (Bson::JavaScriptCodeWithScope(x), Bson::JavaScriptCodeWithScope(y)) => x
            .code
            .cmp(&y.code)
            .then_with(|| compare_documents(&x.scope, &y.scope))
            .into(),
        // MinKey, MaxKey and the null bracket hold a single value each
        _ if a == b || matches!(ba, TypeBracket::MinKey | TypeBracket::Null | TypeBracket::MaxKey) => {
            CompareResult::Equal
        }
        _ => CompareResult::Incomparable,
    }
}

fn compare_numbers(a: &Bson, b: &Bson) -> CompareResult {
    let (Some(x), Some(y)) = (Number::from_bson(a), Number::from_bson(b)) else {
        return CompareResult::Incomparable;
    };
    match (x.is_nan(), y.is_nan()) {
        (true, true) => CompareResult::Equal,
        (true, false) | (false, true) => CompareResult::Incomparable,
        (false, false) => x.cmp_exact(y).map_or(CompareResult::Incomparable, CompareResult::from),
    }
}

/// Documents order by size, then pairwise by key and value. Equal only with identical key order.
fn compare_documents(a: &Document, b: &Document) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
            let o = ka.as_bytes().cmp(kb.as_bytes()).then_with(|| compare_order(va, vb));
            if o != Ordering::Equal {
                return o;
            }
        }
        Ordering::Equal
    })
}

fn compare_arrays(a: &[Bson], b: &[Bson]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let o = compare_order(x, y);
        if o != Ordering::Equal {
            return o;
        }
    }
    a.len().cmp(&b.len())
}

/// Total order used by `$min`/`$max` and sorting. NaN sorts below every other number.
#[must_use]
pub fn compare_order(a: &Bson, b: &Bson) -> Ordering {
    match compare(a, b) {
        CompareResult::Less => Ordering::Less,
        CompareResult::Equal => Ordering::Equal,
        CompareResult::Greater => Ordering::Greater,
        CompareResult::Incomparable => {
            let nan = |v: &Bson| Number::from_bson(v).is_some_and(Number::is_nan);
            match (nan(a), nan(b)) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            }
        }
    }
}

#[must_use]
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    compare(a, b) == CompareResult::Equal
}

/// Equality with array reach-through. `None` is a missing field, which equals only null.
#[must_use]
pub fn matches_equality(candidate: Option<&Bson>, operand: &Bson) -> bool {
    let Some(v) = candidate else {
        return matches!(operand, Bson::Null);
    };
    if values_equal(v, operand) {
        return true;
    }
    match v {
        Bson::Array(arr) => arr.iter().any(|e| values_equal(e, operand)),
        _ => false,
    }
}

/// Ordering operator with type bracketing and array reach-through.
#[must_use]
pub fn matches_ordering(candidate: Option<&Bson>, op: CmpOp, operand: &Bson) -> bool {
    let null = Bson::Null;
    let v = candidate.unwrap_or(&null);
    if ordering_holds(v, op, operand) {
        return true;
    }
    match v {
        Bson::Array(arr) => arr.iter().any(|e| ordering_holds(e, op, operand)),
        _ => false,
    }
}

fn ordering_holds(v: &Bson, op: CmpOp, operand: &Bson) -> bool {
    let cross_bracket = matches!(operand, Bson::MinKey | Bson::MaxKey);
    if !cross_bracket && TypeBracket::of(v) != TypeBracket::of(operand) {
        return false;
    }
    let r = compare(v, operand);
    match op {
        CmpOp::Gt => r == CompareResult::Greater,
        CmpOp::Gte => matches!(r, CompareResult::Greater | CompareResult::Equal),
        CmpOp::Lt => r == CompareResult::Less,
        CmpOp::Lte => matches!(r, CompareResult::Less | CompareResult::Equal),
    }
}
