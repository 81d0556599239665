use bson::{Bson, Document};

use super::compare::{matches_equality, matches_ordering};
use super::expr::{evaluate, is_truthy};
use super::parse::parse_filter;
use super::path::{Path, find_values};
use super::types::{BitsTest, ElemMatch, Filter, InItem, Predicate};
use crate::errors::DbError;
use crate::utils::num::{f64_trunc_to_i64, i64_to_usize};

/// Evaluates a parsed filter against one document.
///
/// # Errors
/// Only `$expr` evaluation can fail, e.g. arithmetic on strings.
pub fn eval_filter(doc: &Document, filter: &Filter) -> Result<bool, DbError> {
    match filter {
        Filter::True | Filter::Comment => Ok(true),
        Filter::And(fs) => {
            for f in fs {
                if !eval_filter(doc, f)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Filter::Or(fs) => {
            for f in fs {
                if eval_filter(doc, f)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Filter::Nor(fs) => {
            for f in fs {
                if eval_filter(doc, f)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Filter::Field { path, pred } => eval_predicate(&candidates(doc, path), pred),
        Filter::Expr(expr) => Ok(is_truthy(evaluate(expr, doc)?.as_ref())),
    }
}

/// Parses `filter` and evaluates it against `doc`.
///
/// # Errors
/// Any parse or evaluation error.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, DbError> {
    let parsed = parse_filter(filter)?;
    let ok = eval_filter(doc, &parsed)?;
    crate::dev6!("{{\"op\":\"match\",\"matched\":{},\"filter_keys\":{}}}", ok, filter.len());
    Ok(ok)
}

fn candidates<'a>(doc: &'a Document, path: &Path) -> Vec<Option<&'a Bson>> {
    let mut found = find_values(doc, path);
    if found.is_empty() {
        found.push(None);
    }
    found
}

// True if `test` holds for a present candidate or, for arrays, any of its elements.
fn any_value(cands: &[Option<&Bson>], test: impl Fn(&Bson) -> bool) -> bool {
    cands.iter().filter_map(|c| *c).any(|v| {
        test(v)
            || match v {
                Bson::Array(items) => items.iter().any(&test),
                _ => false,
            }
    })
}

pub(crate) fn eval_predicate(cands: &[Option<&Bson>], pred: &Predicate) -> Result<bool, DbError> {
    Ok(match pred {
        Predicate::Eq(v) => cands.iter().any(|c| matches_equality(*c, v)),
        Predicate::Ne(v) => !cands.iter().any(|c| matches_equality(*c, v)),
        Predicate::Cmp { op, value } => cands.iter().any(|c| matches_ordering(*c, *op, value)),
        Predicate::In(items) => cands.iter().any(|c| in_set(*c, items)),
        Predicate::Nin(items) => !cands.iter().any(|c| in_set(*c, items)),
        Predicate::Not(inner) => {
            for p in inner {
                if !eval_predicate(cands, p)? {
                    return Ok(true);
                }
            }
            false
        }
        Predicate::Exists(want) => cands.iter().any(Option::is_some) == *want,
        Predicate::ExistsAny => true,
        Predicate::Type(codes) => any_value(cands, |v| codes.iter().any(|c| c.matches(v))),
        Predicate::Size(n) => cands.iter().flatten().any(|v| match v {
            Bson::Array(items) => i64_to_usize(*n) == Some(items.len()),
            _ => false,
        }),
        Predicate::All(items) => {
            !items.is_empty() && items.iter().all(|it| cands.iter().any(|c| matches_equality(*c, it)))
        }
        Predicate::ElemMatch(em) => {
            for v in cands.iter().flatten() {
                let Bson::Array(items) = v else { continue };
                for el in items {
                    if elem_matches(el, em)? {
                        return Ok(true);
                    }
                }
            }
            false
        }
        Predicate::Regex(re) => any_value(cands, |v| re.is_match(v)),
        Predicate::Mod { divisor, remainder } => {
            any_value(cands, |v| mod_value(v).is_some_and(|x| x.wrapping_rem(*divisor) == *remainder))
        }
        Predicate::Bits { test, mask } => any_value(cands, |v| bits_match(v, *test, mask)),
    })
}

fn in_set(cand: Option<&Bson>, items: &[InItem]) -> bool {
    items.iter().any(|item| match item {
        InItem::Value(v) => matches_equality(cand, v),
        InItem::Regex(re) => cand.is_some_and(|c| {
            re.is_match(c)
                || match c {
                    Bson::Array(els) => els.iter().any(|e| re.is_match(e)),
                    _ => false,
                }
        }),
    })
}

fn elem_matches(el: &Bson, em: &ElemMatch) -> Result<bool, DbError> {
    match em {
        ElemMatch::Value(preds) => {
            let cands = [Some(el)];
            for p in preds {
                if !eval_predicate(&cands, p)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ElemMatch::Document(filter) => match el {
            Bson::Document(d) => eval_filter(d, filter),
            _ => Ok(false),
        },
    }
}

// Doubles are truncated; non-finite or out-of-range values never match.
fn mod_value(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) => f64_trunc_to_i64(*f),
        _ => None,
    }
}

fn bits_match(v: &Bson, test: BitsTest, mask: &[u64]) -> bool {
    let bit_at: Box<dyn Fn(u64) -> bool + '_> = match v {
        Bson::Int32(i) => {
            let n = i64::from(*i);
            Box::new(move |p| integer_bit(n, p))
        }
        Bson::Int64(n) => {
            let n = *n;
            Box::new(move |p| integer_bit(n, p))
        }
        Bson::Double(f) if f.fract() == 0.0 => match f64_trunc_to_i64(*f) {
            Some(n) => Box::new(move |p| integer_bit(n, p)),
            None => return false,
        },
        Bson::Binary(bin) => Box::new(move |p| {
            usize::try_from(p / 8)
                .ok()
                .and_then(|i| bin.bytes.get(i))
                .is_some_and(|byte| byte & (1 << (p % 8)) != 0)
        }),
        _ => return false,
    };
    match test {
        BitsTest::AllSet => mask.iter().all(|p| bit_at(*p)),
        BitsTest::AllClear => mask.iter().all(|p| !bit_at(*p)),
        BitsTest::AnySet => mask.iter().any(|p| bit_at(*p)),
        BitsTest::AnyClear => mask.iter().any(|p| !bit_at(*p)),
    }
}

// Positions past 63 read the sign bit, as for a sign-extended integer.
fn integer_bit(n: i64, pos: u64) -> bool {
    if pos >= 64 { n < 0 } else { (n >> pos) & 1 == 1 }
}
