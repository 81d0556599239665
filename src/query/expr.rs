//! Aggregation expressions usable inside `$expr`.
//!
//! Only the operators that make sense for a per-document boolean test are
//! supported: comparisons, boolean logic, basic arithmetic, `$size`, `$type`,
//! `$ifNull` and `$cond`. Missing fields evaluate to null.

use bson::{Bson, Document};
use std::cmp::Ordering;

use super::compare::compare_order;
use super::path::Path;
use crate::document::{Number, format_value, type_alias};
use crate::errors::{DbError, ErrorCode};
use crate::utils::num::usize_to_i64;

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Bson),
    FieldPath(Path),
    /// `$$ROOT` / `$$CURRENT`.
    Root,
    Array(Vec<Expression>),
    Object(Vec<(String, Expression)>),
    Op { op: ExprOp, args: Vec<Expression> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Cmp,
    And,
    Or,
    Not,
    Add,
    Subtract,
    Multiply,
    Abs,
    Size,
    Type,
    IfNull,
    Cond,
}

impl ExprOp {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$cmp" => Self::Cmp,
            "$and" => Self::And,
            "$or" => Self::Or,
            "$not" => Self::Not,
            "$add" => Self::Add,
            "$subtract" => Self::Subtract,
            "$multiply" => Self::Multiply,
            "$abs" => Self::Abs,
            "$size" => Self::Size,
            "$type" => Self::Type,
            "$ifNull" => Self::IfNull,
            "$cond" => Self::Cond,
            _ => return None,
        })
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Cmp => "$cmp",
            Self::And => "$and",
            Self::Or => "$or",
            Self::Not => "$not",
            Self::Add => "$add",
            Self::Subtract => "$subtract",
            Self::Multiply => "$multiply",
            Self::Abs => "$abs",
            Self::Size => "$size",
            Self::Type => "$type",
            Self::IfNull => "$ifNull",
            Self::Cond => "$cond",
        }
    }

    fn arity(self) -> Option<usize> {
        match self {
            Self::Eq | Self::Ne | Self::Gt | Self::Gte | Self::Lt | Self::Lte | Self::Cmp | Self::Subtract => {
                Some(2)
            }
            Self::Not | Self::Abs | Self::Size | Self::Type => Some(1),
            Self::Cond => Some(3),
            Self::And | Self::Or | Self::Add | Self::Multiply | Self::IfNull => None,
        }
    }
}

/// Parses an expression operand.
///
/// # Errors
/// `InvalidPipelineOperator` for unknown operators, `BadValue` for malformed ones.
pub fn parse_expression(v: &Bson) -> Result<Expression, DbError> {
    match v {
        Bson::String(s) if s.starts_with("$$") => match &s[2..] {
            "ROOT" | "CURRENT" => Ok(Expression::Root),
            other => Err(DbError::bad_value(format!("Use of undefined variable: {other}"))),
        },
        Bson::String(s) if s.starts_with('$') => {
            if s.len() == 1 {
                return Err(DbError::bad_value("'$' by itself is not a valid FieldPath"));
            }
            Path::parse(&s[1..]).map(Expression::FieldPath).map_err(|e| e.to_filter_error(&s[1..]))
        }
        Bson::Array(items) => Ok(Expression::Array(items.iter().map(parse_expression).collect::<Result<_, _>>()?)),
        Bson::Document(d) => parse_document_expression(d),
        other => Ok(Expression::Literal(other.clone())),
    }
}

fn parse_document_expression(d: &Document) -> Result<Expression, DbError> {
    let Some((first, operand)) = d.iter().next() else {
        return Ok(Expression::Object(Vec::new()));
    };
    if !first.starts_with('$') {
        let mut fields = Vec::with_capacity(d.len());
        for (k, v) in d {
            if k.starts_with('$') {
                return Err(DbError::bad_value(format!(
                    "FieldPath field names may not start with '$'. Consider using $getField or $setField. ({k})"
                )));
            }
            fields.push((k.clone(), parse_expression(v)?));
        }
        return Ok(Expression::Object(fields));
    }
    if d.len() != 1 {
        return Err(DbError::bad_value(format!(
            "an expression specification must contain exactly one field, the name of the expression. Found {} fields in {}",
            d.len(),
            format_value(&Bson::Document(d.clone()))
        )));
    }
    if first == "$literal" {
        return Ok(Expression::Literal(operand.clone()));
    }
    let Some(op) = ExprOp::from_name(first) else {
        return Err(DbError::command(
            ErrorCode::InvalidPipelineOperator,
            format!("Unrecognized expression '{first}'"),
        ));
    };
    let args = match (op, operand) {
        (ExprOp::Cond, Bson::Document(c)) => cond_args(c)?,
        (_, Bson::Array(items)) => items.iter().map(parse_expression).collect::<Result<Vec<_>, _>>()?,
        (_, single) => vec![parse_expression(single)?],
    };
    if let Some(n) = op.arity()
        && args.len() != n
    {
        return Err(DbError::bad_value(format!(
            "Expression {} takes exactly {n} arguments. {} were passed in.",
            op.name(),
            args.len()
        )));
    }
    if op == ExprOp::IfNull && args.len() < 2 {
        return Err(DbError::bad_value(format!("$ifNull needs at least two arguments, had: {}", args.len())));
    }
    Ok(Expression::Op { op, args })
}

fn cond_args(c: &Document) -> Result<Vec<Expression>, DbError> {
    for k in c.keys() {
        if !matches!(k.as_str(), "if" | "then" | "else") {
            return Err(DbError::bad_value(format!("Unrecognized parameter to $cond: {k}")));
        }
    }
    ["if", "then", "else"]
        .iter()
        .map(|k| {
            c.get(*k)
                .ok_or_else(|| DbError::bad_value(format!("Missing '{k}' parameter to $cond")))
                .and_then(parse_expression)
        })
        .collect()
}

/// Evaluates `expr` against `doc`. `None` is a missing value.
///
/// # Errors
/// Type errors from arithmetic and `$size`.
pub fn evaluate(expr: &Expression, doc: &Document) -> Result<Option<Bson>, DbError> {
    match expr {
        Expression::Literal(v) => Ok(Some(v.clone())),
        Expression::Root => Ok(Some(Bson::Document(doc.clone()))),
        Expression::FieldPath(path) => Ok(resolve_field(doc, path.segments())),
        Expression::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for e in items {
                out.push(evaluate(e, doc)?.unwrap_or(Bson::Null));
            }
            Ok(Some(Bson::Array(out)))
        }
        Expression::Object(fields) => {
            let mut out = Document::new();
            for (k, e) in fields {
                if let Some(v) = evaluate(e, doc)? {
                    out.insert(k.clone(), v);
                }
            }
            Ok(Some(Bson::Document(out)))
        }
        Expression::Op { op, args } => evaluate_op(*op, args, doc),
    }
}

/// Truthiness of an expression result: false, null, zero and missing are false.
#[must_use]
pub fn is_truthy(v: Option<&Bson>) -> bool {
    match v {
        None | Some(Bson::Null | Bson::Undefined) => false,
        Some(Bson::Boolean(b)) => *b,
        Some(other) => Number::from_bson(other).is_none_or(|n| !n.is_zero()),
    }
}

fn resolve_field(doc: &Document, segs: &[String]) -> Option<Bson> {
    let (first, rest) = segs.split_first()?;
    resolve_value(doc.get(first)?, rest)
}

// Arrays along the path map the remaining path over their elements.
fn resolve_value(v: &Bson, segs: &[String]) -> Option<Bson> {
    if segs.is_empty() {
        return Some(v.clone());
    }
    match v {
        Bson::Document(d) => resolve_field(d, segs),
        Bson::Array(items) => Some(Bson::Array(
            items
                .iter()
                .filter(|e| matches!(e, Bson::Document(_) | Bson::Array(_)))
                .filter_map(|e| resolve_value(e, segs))
                .collect(),
        )),
        _ => None,
    }
}

fn evaluate_op(op: ExprOp, args: &[Expression], doc: &Document) -> Result<Option<Bson>, DbError> {
    let arg = |i: usize| -> Result<Option<Bson>, DbError> {
        match args.get(i) {
            Some(e) => evaluate(e, doc),
            None => Ok(None),
        }
    };
    let null = Bson::Null;
    match op {
        ExprOp::Eq | ExprOp::Ne | ExprOp::Gt | ExprOp::Gte | ExprOp::Lt | ExprOp::Lte | ExprOp::Cmp => {
            let (a, b) = (arg(0)?, arg(1)?);
            let ord = compare_order(a.as_ref().unwrap_or(&null), b.as_ref().unwrap_or(&null));
            let out = match op {
                ExprOp::Eq => Bson::Boolean(ord == Ordering::Equal),
                ExprOp::Ne => Bson::Boolean(ord != Ordering::Equal),
                ExprOp::Gt => Bson::Boolean(ord == Ordering::Greater),
                ExprOp::Gte => Bson::Boolean(ord != Ordering::Less),
                ExprOp::Lt => Bson::Boolean(ord == Ordering::Less),
                ExprOp::Lte => Bson::Boolean(ord != Ordering::Greater),
                _ => Bson::Int32(match ord {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                }),
            };
            Ok(Some(out))
        }
        ExprOp::And => {
            for e in args {
                if !is_truthy(evaluate(e, doc)?.as_ref()) {
                    return Ok(Some(Bson::Boolean(false)));
                }
            }
            Ok(Some(Bson::Boolean(true)))
        }
        ExprOp::Or => {
            for e in args {
                if is_truthy(evaluate(e, doc)?.as_ref()) {
                    return Ok(Some(Bson::Boolean(true)));
                }
            }
            Ok(Some(Bson::Boolean(false)))
        }
        ExprOp::Not => Ok(Some(Bson::Boolean(!is_truthy(arg(0)?.as_ref())))),
        ExprOp::Add | ExprOp::Multiply => {
            let mut acc = if op == ExprOp::Add { Number::Int32(0) } else { Number::Int32(1) };
            for e in args {
                let Some(n) = numeric_arg(op, evaluate(e, doc)?)? else {
                    return Ok(Some(Bson::Null));
                };
                acc = if op == ExprOp::Add {
                    arith(acc, n, i64::checked_add, |a, b| a + b)
                } else {
                    arith(acc, n, i64::checked_mul, |a, b| a * b)
                };
            }
            Ok(Some(acc.to_bson()))
        }
        ExprOp::Subtract => {
            let (Some(a), Some(b)) = (numeric_arg(op, arg(0)?)?, numeric_arg(op, arg(1)?)?) else {
                return Ok(Some(Bson::Null));
            };
            Ok(Some(arith(a, b, i64::checked_sub, |x, y| x - y).to_bson()))
        }
        ExprOp::Abs => {
            let Some(n) = numeric_arg(op, arg(0)?)? else {
                return Ok(Some(Bson::Null));
            };
            let out = match n {
                Number::Int32(i) => i.checked_abs().map_or(Bson::Int64(i64::from(i).abs()), Bson::Int32),
                Number::Int64(i) => Bson::Int64(
                    i.checked_abs().ok_or_else(|| DbError::bad_value("can't take $abs of long long min"))?,
                ),
                Number::Double(f) => Bson::Double(f.abs()),
            };
            Ok(Some(out))
        }
        ExprOp::Size => match arg(0)? {
            Some(Bson::Array(items)) => Ok(Some(
                i32::try_from(items.len()).map_or_else(|_| Bson::Int64(usize_to_i64(items.len())), Bson::Int32),
            )),
            other => Err(DbError::bad_value(format!(
                "The argument to $size must be an array. Type of the argument was: {}",
                other.as_ref().map_or("missing", type_alias)
            ))),
        },
        ExprOp::Type => Ok(Some(Bson::String(
            arg(0)?.as_ref().map_or("missing", type_alias).to_string(),
        ))),
        ExprOp::IfNull => {
            let (last, rest) = args.split_last().map_or((None, &[][..]), |(l, r)| (Some(l), r));
            for e in rest {
                match evaluate(e, doc)? {
                    None | Some(Bson::Null | Bson::Undefined) => {}
                    Some(v) => return Ok(Some(v)),
                }
            }
            match last {
                Some(e) => evaluate(e, doc),
                None => Ok(None),
            }
        }
        ExprOp::Cond => {
            if is_truthy(arg(0)?.as_ref()) { arg(1) } else { arg(2) }
        }
    }
}

fn numeric_arg(op: ExprOp, v: Option<Bson>) -> Result<Option<Number>, DbError> {
    match v {
        None | Some(Bson::Null | Bson::Undefined) => Ok(None),
        Some(v) => Number::from_bson(&v).map(Some).ok_or_else(|| {
            DbError::type_mismatch(format!("{} only supports numeric types, not {}", op.name(), type_alias(&v)))
        }),
    }
}

// Integer overflow falls back to a double result.
fn arith(a: Number, b: Number, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Number {
    match (a.as_i64_lossless(), b.as_i64_lossless()) {
        (Some(x), Some(y)) => match int_op(x, y) {
            Some(r) if matches!((a, b), (Number::Int32(_), Number::Int32(_))) => {
                i32::try_from(r).map_or(Number::Int64(r), Number::Int32)
            }
            Some(r) => Number::Int64(r),
            None => Number::Double(float_op(a.as_f64(), b.as_f64())),
        },
        _ => Number::Double(float_op(a.as_f64(), b.as_f64())),
    }
}
