use bson::{Bson, Document};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::compare::{compare_order, values_equal};
use super::eval::eval_predicate;
use super::parse::{parse_filter, parse_predicates, parse_update};
use super::path::{
    Path, check_document_source, check_document_target, check_traversable, get_path, get_path_mut, remove_path,
    set_path,
};
use super::pattern::CompiledRegex;
use super::types::{UpdateField, UpdateOp, UpdateOptions, UpdateOutcome, UpdateSpec};
use crate::document::{Number, format_value, type_alias};
use crate::errors::{DbError, ErrorCode};
use crate::utils::num::whole_number;

/// Applies a parsed update. The document is only replaced when every modifier succeeds.
///
/// # Errors
/// Any modifier error, or `ImmutableField` if `_id` would change.
pub fn apply_update(doc: &mut Document, spec: &UpdateSpec) -> Result<UpdateOutcome, DbError> {
    apply_update_with_options(doc, spec, UpdateOptions::default())
}

/// Like [`apply_update`], with `$setOnInsert` enabled when `opts.is_insert` is set.
///
/// # Errors
/// As [`apply_update`].
pub fn apply_update_with_options(
    doc: &mut Document,
    spec: &UpdateSpec,
    opts: UpdateOptions,
) -> Result<UpdateOutcome, DbError> {
    let mut work = doc.clone();
    let mut touched = BTreeSet::new();
    match spec {
        UpdateSpec::Replacement(replacement) => {
            work = replace(doc, replacement, &mut touched);
        }
        UpdateSpec::Operators(ops) => {
            for (op, fields) in ops {
                for field in fields {
                    apply_field(&mut work, *op, field, opts, &mut touched)?;
                }
            }
        }
    }
    let id_kept = match (doc.get("_id"), work.get("_id")) {
        (Some(a), Some(b)) => identical(a, b),
        (None, _) => true,
        (Some(_), None) => false,
    };
    if !id_kept {
        return Err(DbError::command(
            ErrorCode::ImmutableField,
            "Performing an update on the path '_id' would modify the immutable field '_id'",
        ));
    }
    *doc = work;
    Ok(UpdateOutcome { modified: !touched.is_empty(), touched })
}

/// Parses `update` and applies it to `doc`.
///
/// # Errors
/// Any parse or apply error; `doc` is untouched on error.
pub fn update_document(doc: &mut Document, update: &Document) -> Result<UpdateOutcome, DbError> {
    let spec = parse_update(update)?;
    let outcome = apply_update(doc, &spec)?;
    crate::dev6!(
        "{{\"op\":\"update\",\"modified\":{},\"touched\":{}}}",
        outcome.modified,
        outcome.touched.len()
    );
    Ok(outcome)
}

// Stored-value identity: type-sensitive, with NaN equal to NaN.
fn identical(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Double(x), Bson::Double(y)) => x.to_bits() == y.to_bits() || x == y,
        _ => a == b,
    }
}

fn replace(old: &Document, replacement: &Document, touched: &mut BTreeSet<String>) -> Document {
    let mut out = Document::new();
    if let Some(id) = old.get("_id") {
        out.insert("_id", id.clone());
    }
    for (k, v) in replacement {
        out.insert(k.clone(), v.clone());
    }
    for k in old.keys().chain(out.keys()) {
        let same = match (old.get(k), out.get(k)) {
            (Some(a), Some(b)) => identical(a, b),
            _ => false,
        };
        if !same {
            touched.insert(k.clone());
        }
    }
    out
}

fn id_label(doc: &Document) -> String {
    doc.get("_id").map_or_else(|| "{}".to_string(), |id| format!("{{_id: {}}}", format_value(id)))
}

fn write(work: &mut Document, path: &Path, value: Bson, touched: &mut BTreeSet<String>) -> Result<(), DbError> {
    if get_path(work, path).is_some_and(|cur| identical(cur, &value)) {
        return Ok(());
    }
    set_path(work, path, value)?;
    touched.insert(path.to_string());
    Ok(())
}

fn apply_field(
    work: &mut Document,
    op: UpdateOp,
    field: &UpdateField,
    opts: UpdateOptions,
    touched: &mut BTreeSet<String>,
) -> Result<(), DbError> {
    let path = &field.path;
    let operand = &field.operand;
    match op {
        UpdateOp::CurrentDate => write(work, path, current_date(operand), touched),
        UpdateOp::Inc | UpdateOp::Mul => apply_arithmetic(work, op, path, operand, touched),
        UpdateOp::Min | UpdateOp::Max => {
            let want = if op == UpdateOp::Min { Ordering::Less } else { Ordering::Greater };
            let replace = get_path(work, path).is_none_or(|cur| compare_order(operand, cur) == want);
            if replace { write(work, path, operand.clone(), touched) } else { Ok(()) }
        }
        UpdateOp::Rename => {
            let Bson::String(to) = operand else { return Ok(()) };
            let target = Path::parse(to).map_err(|e| e.to_update_error(to))?;
            check_document_source(work, path)?;
            let Some(value) = get_path(work, path).cloned() else { return Ok(()) };
            check_document_target(work, &target)?;
            remove_path(work, path);
            touched.insert(path.to_string());
            set_path(work, &target, value)?;
            touched.insert(target.to_string());
            Ok(())
        }
        UpdateOp::Set => write(work, path, operand.clone(), touched),
        UpdateOp::SetOnInsert => {
            let skip = matches!(operand, Bson::Null) || matches!(operand, Bson::Array(a) if a.is_empty());
            if !opts.is_insert || skip || path.is_dotted() {
                return Ok(());
            }
            write(work, path, operand.clone(), touched)
        }
        UpdateOp::Unset => {
            if remove_path(work, path).is_some() {
                touched.insert(path.to_string());
            }
            Ok(())
        }
        UpdateOp::Pop => {
            let Ok(end) = whole_number(operand) else { return Ok(()) };
            if let Some(Bson::Array(items)) = get_path_mut(work, path)
                && !items.is_empty()
            {
                match end {
                    1 => {
                        items.pop();
                    }
                    -1 => {
                        items.remove(0);
                    }
                    _ => return Ok(()),
                }
                touched.insert(path.to_string());
            }
            Ok(())
        }
        UpdateOp::Push | UpdateOp::AddToSet => apply_push(work, op, path, operand, touched),
        UpdateOp::PullAll | UpdateOp::Pull => apply_pull(work, op, path, operand, touched),
        UpdateOp::Bit => apply_bit(work, path, operand, touched),
    }
}

fn current_date(operand: &Bson) -> Bson {
    let now = chrono::Utc::now();
    let wants_timestamp = matches!(operand, Bson::Document(d) if d.get_str("$type").is_ok_and(|t| t == "timestamp"));
    if wants_timestamp {
        let secs = u32::try_from(now.timestamp()).unwrap_or(u32::MAX);
        Bson::Timestamp(bson::Timestamp { time: secs, increment: 1 })
    } else {
        Bson::DateTime(bson::DateTime::from_millis(now.timestamp_millis()))
    }
}

fn number_label(n: Number) -> String {
    match n {
        Number::Int32(i) => format!("(NumberInt){i}"),
        Number::Int64(i) => format!("(NumberLong){i}"),
        Number::Double(f) => format!("(NumberDouble){}", crate::document::format::format_double(f)),
    }
}

fn apply_arithmetic(
    work: &mut Document,
    op: UpdateOp,
    path: &Path,
    operand: &Bson,
    touched: &mut BTreeSet<String>,
) -> Result<(), DbError> {
    let Some(arg) = Number::from_bson(operand) else {
        return Err(DbError::type_mismatch(format!(
            "Cannot {} with non-numeric argument: {{{path}: {}}}",
            if op == UpdateOp::Inc { "increment" } else { "multiply" },
            format_value(operand)
        )));
    };
    let result = match get_path(work, path) {
        None => {
            if op == UpdateOp::Inc {
                arg
            } else {
                arg.zero_like()
            }
        }
        Some(cur) => {
            let Some(current) = Number::from_bson(cur) else {
                return Err(DbError::type_mismatch(format!(
                    "Cannot apply {} to a value of non-numeric type. {} has the field '{}' of non-numeric type {}",
                    op.name(),
                    id_label(work),
                    path.leaf(),
                    type_alias(cur)
                )));
            };
            let computed =
                if op == UpdateOp::Inc { current.checked_add(arg) } else { current.checked_mul(arg) };
            let Ok(mut out) = computed else {
                return Err(DbError::bad_value(format!(
                    "Failed to apply {} operations to current value ({}) for document {}",
                    op.name(),
                    number_label(current),
                    id_label(work)
                )));
            };
            // an integer zero factor never yields a negative zero
            if let Number::Double(f) = out
                && f == 0.0
                && f.is_sign_negative()
                && (current.as_i64_lossless().is_some() || arg.as_i64_lossless().is_some())
                && (current.is_zero() || arg.is_zero())
            {
                out = Number::Double(0.0);
            }
            out
        }
    };
    if result.is_infinite() {
        return Err(DbError::bad_value(format!(
            "update produces invalid value: {{ \"{path}\": {} }} (update operations that produce infinity values are not allowed)",
            format_value(&result.to_bson())
        )));
    }
    write(work, path, result.to_bson(), touched)
}

fn push_items(op: UpdateOp, operand: &Bson) -> Result<Vec<Bson>, DbError> {
    match operand {
        Bson::Document(d) if d.keys().next().is_some_and(|k| k == "$each") => {
            if let Some(clause) = d.keys().find(|k| *k != "$each") {
                return Err(DbError::not_implemented(format!("{clause} in {} is not implemented yet", op.name())));
            }
            match d.get("$each") {
                Some(Bson::Array(items)) => Ok(items.clone()),
                other => Err(DbError::bad_value(format!(
                    "The argument to $each in {} must be an array but it was of type: {}",
                    op.name(),
                    other.map_or("missing", type_alias)
                ))),
            }
        }
        single => Ok(vec![single.clone()]),
    }
}

fn apply_push(
    work: &mut Document,
    op: UpdateOp,
    path: &Path,
    operand: &Bson,
    touched: &mut BTreeSet<String>,
) -> Result<(), DbError> {
    let items = push_items(op, operand)?;
    let mut array = match get_path(work, path) {
        None => Vec::new(),
        Some(Bson::Array(existing)) => existing.clone(),
        Some(other) => {
            return Err(DbError::type_mismatch(format!(
                "The field '{}' must be an array but is of type '{}' in document {}",
                path.leaf(),
                type_alias(other),
                id_label(work)
            )));
        }
    };
    let before = array.len();
    for item in items {
        if op == UpdateOp::AddToSet && array.iter().any(|e| values_equal(e, &item)) {
            continue;
        }
        array.push(item);
    }
    let created = get_path(work, path).is_none();
    if array.len() == before && !created {
        return Ok(());
    }
    set_path(work, path, Bson::Array(array))?;
    touched.insert(path.to_string());
    Ok(())
}

/// Decides whether one array element is removed by `$pull`.
enum PullCondition {
    Equal(Bson),
    Predicates(Vec<super::types::Predicate>),
    Filter(super::types::Filter),
    Regex(CompiledRegex),
}

impl PullCondition {
    fn parse(path: &Path, operand: &Bson) -> Result<Self, DbError> {
        Ok(match operand {
            Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => {
                let logical = d.keys().next().is_some_and(|k| matches!(k.as_str(), "$and" | "$or" | "$nor"));
                if logical { Self::Filter(parse_filter(d)?) } else { Self::Predicates(parse_predicates(path, d, 0)?) }
            }
            Bson::Document(d) => Self::Filter(parse_filter(d)?),
            Bson::RegularExpression(re) => Self::Regex(CompiledRegex::new(re.pattern.as_str(), re.options.as_str())?),
            other => Self::Equal(other.clone()),
        })
    }

    fn removes(&self, el: &Bson) -> Result<bool, DbError> {
        match self {
            Self::Equal(v) => Ok(values_equal(el, v)),
            Self::Regex(re) => Ok(re.is_match(el)),
            Self::Predicates(preds) => {
                let cands = [Some(el)];
                for p in preds {
                    if !eval_predicate(&cands, p)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Filter(f) => match el {
                Bson::Document(d) => super::eval::eval_filter(d, f),
                _ => Ok(false),
            },
        }
    }
}

fn apply_pull(
    work: &mut Document,
    op: UpdateOp,
    path: &Path,
    operand: &Bson,
    touched: &mut BTreeSet<String>,
) -> Result<(), DbError> {
    check_traversable(work, path)?;
    let Some(current) = get_path(work, path) else { return Ok(()) };
    let Bson::Array(items) = current else {
        return Err(DbError::bad_value("Cannot apply $pull to a non-array value"));
    };
    let mut kept = Vec::with_capacity(items.len());
    if op == UpdateOp::PullAll {
        let Bson::Array(values) = operand else {
            return Err(DbError::bad_value(format!(
                "$pullAll requires an array argument but was given a {}",
                type_alias(operand)
            )));
        };
        kept.extend(items.iter().filter(|e| !values.iter().any(|v| values_equal(e, v))).cloned());
    } else {
        let cond = PullCondition::parse(path, operand)?;
        for el in items {
            if !cond.removes(el)? {
                kept.push(el.clone());
            }
        }
    }
    if kept.len() == items.len() {
        return Ok(());
    }
    set_path(work, path, Bson::Array(kept))?;
    touched.insert(path.to_string());
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn apply_bit(work: &mut Document, path: &Path, operand: &Bson, touched: &mut BTreeSet<String>) -> Result<(), DbError> {
    let Bson::Document(ops) = operand else { return Ok(()) };
    let mut value = match get_path(work, path) {
        None => Bson::Int32(0),
        Some(v @ (Bson::Int32(_) | Bson::Int64(_))) => v.clone(),
        Some(other) => {
            return Err(DbError::bad_value(format!(
                "Cannot apply $bit to a value of non-integral type._id: {} has the field {} of non-integer type {}",
                work.get("_id").map_or_else(|| "null".to_string(), format_value),
                path.leaf(),
                type_alias(other)
            )));
        }
    };
    for (name, arg) in ops {
        value = match (&value, arg) {
            (Bson::Int32(a), Bson::Int32(b)) => Bson::Int32(bitwise(name, i64::from(*a), i64::from(*b)) as i32),
            (a, b) => {
                let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) else { continue };
                Bson::Int64(bitwise(name, x, y))
            }
        };
    }
    write(work, path, value, touched)
}

fn as_i64(v: &Bson) -> Option<i64> {
    Number::from_bson(v).and_then(Number::as_i64_lossless)
}

fn bitwise(name: &str, a: i64, b: i64) -> i64 {
    match name {
        "and" => a & b,
        "or" => a | b,
        _ => a ^ b,
    }
}
