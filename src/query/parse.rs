use bson::{Bson, Document};
use std::collections::BTreeMap;

use super::expr::parse_expression;
use super::path::Path;
use super::pattern::CompiledRegex;
use super::types::{
    BitsTest, CmpOp, ElemMatch, Filter, InItem, MAX_FILTER_DEPTH, Predicate, UpdateField, UpdateOp,
    UpdateSpec,
};
use crate::document::{TypeCode, format_value, type_alias};
use crate::errors::{DbError, ErrorCode};
use crate::utils::json::parse_json_to_bson_document;
use crate::utils::num::{WholeNumberError, f64_trunc_to_i64, whole_number};

/// Builds a [`Filter`] from a filter document.
///
/// # Errors
/// `BadValue` for malformed operators, `NotImplemented` for `$where`/`$text`,
/// regex errors from `$regex`.
pub fn parse_filter(filter: &Document) -> Result<Filter, DbError> {
    parse_filter_at(filter, 0)
}

/// # Errors
/// Returns an error if the JSON is not an object or the filter is invalid.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    parse_filter(&parse_json_to_bson_document(json)?)
}

fn parse_filter_at(filter: &Document, depth: usize) -> Result<Filter, DbError> {
    if depth > MAX_FILTER_DEPTH {
        return Err(DbError::bad_value(format!("exceeded depth limit of {MAX_FILTER_DEPTH} when parsing filter")));
    }
    let mut clauses = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        match key.as_str() {
            "$and" | "$or" | "$nor" => {
                let list = parse_logical(key, value, depth)?;
                clauses.push(match key.as_str() {
                    "$and" => Filter::And(list),
                    "$or" => Filter::Or(list),
                    _ => Filter::Nor(list),
                });
            }
            "$comment" => clauses.push(Filter::Comment),
            "$expr" => clauses.push(Filter::Expr(parse_expression(value)?)),
            "$where" | "$text" => {
                return Err(DbError::not_implemented(format!("{key} is not implemented yet")));
            }
            op if op.starts_with('$') => {
                return Err(DbError::bad_value(format!(
                    "unknown top level operator: {op}. If you have a field name that starts with a '$' symbol, consider using $getField or $setField."
                )));
            }
            field => {
                let path = Path::parse(field).map_err(|e| e.to_filter_error(field))?;
                for pred in parse_field_value(&path, value, depth)? {
                    clauses.push(Filter::Field { path: path.clone(), pred });
                }
            }
        }
    }
    Ok(match clauses.len() {
        0 => Filter::True,
        1 => clauses.pop().unwrap_or(Filter::True),
        _ => Filter::And(clauses),
    })
}

fn parse_logical(op: &str, value: &Bson, depth: usize) -> Result<Vec<Filter>, DbError> {
    let Bson::Array(items) = value else {
        return Err(DbError::bad_value(format!("{op} must be an array")));
    };
    if items.is_empty() {
        return Err(DbError::bad_value("$and/$or/$nor must be a nonempty array"));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter_at(d, depth + 1),
            _ => Err(DbError::bad_value("$or/$and/$nor entries need to be full objects")),
        })
        .collect()
}

fn is_operator_document(d: &Document) -> bool {
    d.keys().next().is_some_and(|k| k.starts_with('$'))
}

/// Predicates for the value of a field key.
fn parse_field_value(path: &Path, value: &Bson, depth: usize) -> Result<Vec<Predicate>, DbError> {
    match value {
        Bson::Document(d) if is_operator_document(d) => parse_predicates(path, d, depth),
        Bson::RegularExpression(re) => {
            Ok(vec![Predicate::Regex(CompiledRegex::new(re.pattern.as_str(), re.options.as_str())?)])
        }
        other => Ok(vec![Predicate::Eq(other.clone())]),
    }
}

/// Parses an operator document such as `{$gt: 1, $lt: 5}`.
pub(crate) fn parse_predicates(path: &Path, ops: &Document, depth: usize) -> Result<Vec<Predicate>, DbError> {
    let mut preds = Vec::with_capacity(ops.len());
    let mut regex: Option<(String, Option<String>)> = None;
    let mut options: Option<String> = None;
    for (op, operand) in ops {
        match op.as_str() {
            "$regex" => {
                regex = Some(match operand {
                    Bson::String(s) => (s.clone(), None),
                    Bson::RegularExpression(re) => {
                        (re.pattern.as_str().to_string(), Some(re.options.as_str().to_string()))
                    }
                    _ => return Err(DbError::bad_value("$regex has to be a string")),
                });
            }
            "$options" => {
                let Bson::String(s) = operand else {
                    return Err(DbError::bad_value("$options has to be a string"));
                };
                options = Some(s.clone());
            }
            _ => preds.push(parse_operator(path, op, operand, depth)?),
        }
    }
    match (regex, options) {
        (Some((pattern, inline)), explicit) => {
            let opts = match (inline, explicit) {
                (Some(i), Some(_)) if !i.is_empty() => {
                    return Err(DbError::command(ErrorCode::RegexOptions, "options set in both $regex and $options"));
                }
                (_, Some(o)) => o,
                (Some(i), None) => i,
                (None, None) => String::new(),
            };
            preds.push(Predicate::Regex(CompiledRegex::new(&pattern, &opts)?));
        }
        (None, Some(_)) => return Err(DbError::bad_value("$options needs a $regex")),
        (None, None) => {}
    }
    Ok(preds)
}

fn parse_operator(path: &Path, op: &str, operand: &Bson, depth: usize) -> Result<Predicate, DbError> {
    let cmp = |op: CmpOp| -> Result<Predicate, DbError> {
        if matches!(operand, Bson::RegularExpression(_)) {
            return Err(DbError::bad_value(format!("Can't have RegEx as arg to predicate over field '{path}'.")));
        }
        Ok(Predicate::Cmp { op, value: operand.clone() })
    };
    match op {
        "$eq" => Ok(Predicate::Eq(operand.clone())),
        "$ne" => {
            if matches!(operand, Bson::RegularExpression(_)) {
                return Err(DbError::bad_value("Can't have regex as arg to $ne."));
            }
            Ok(Predicate::Ne(operand.clone()))
        }
        "$gt" => cmp(CmpOp::Gt),
        "$gte" => cmp(CmpOp::Gte),
        "$lt" => cmp(CmpOp::Lt),
        "$lte" => cmp(CmpOp::Lte),
        "$in" => Ok(Predicate::In(parse_in_items(op, operand)?)),
        "$nin" => Ok(Predicate::Nin(parse_in_items(op, operand)?)),
        "$not" => parse_not(path, operand, depth),
        "$exists" => Ok(match operand {
            Bson::Boolean(b) => Predicate::Exists(*b),
            _ => Predicate::ExistsAny,
        }),
        "$type" => parse_type(operand).map(Predicate::Type),
        "$size" => parse_size(operand).map(Predicate::Size),
        "$all" => match operand {
            Bson::Array(items) => Ok(Predicate::All(items.clone())),
            _ => Err(DbError::bad_value("$all needs an array")),
        },
        "$elemMatch" => parse_elem_match(path, operand, depth).map(Predicate::ElemMatch),
        "$mod" => parse_mod(operand),
        "$bitsAllClear" => parse_bits(op, operand, BitsTest::AllClear),
        "$bitsAllSet" => parse_bits(op, operand, BitsTest::AllSet),
        "$bitsAnyClear" => parse_bits(op, operand, BitsTest::AnyClear),
        "$bitsAnySet" => parse_bits(op, operand, BitsTest::AnySet),
        other => Err(DbError::bad_value(format!("unknown operator: {other}"))),
    }
}

fn parse_in_items(op: &str, operand: &Bson) -> Result<Vec<InItem>, DbError> {
    let Bson::Array(items) = operand else {
        return Err(DbError::bad_value(format!("{op} needs an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) if is_operator_document(d) => {
                Err(DbError::bad_value(format!("cannot nest $ under {op}")))
            }
            Bson::RegularExpression(re) => {
                CompiledRegex::new(re.pattern.as_str(), re.options.as_str()).map(InItem::Regex)
            }
            other => Ok(InItem::Value(other.clone())),
        })
        .collect()
}

fn parse_not(path: &Path, operand: &Bson, depth: usize) -> Result<Predicate, DbError> {
    match operand {
        Bson::RegularExpression(re) => Ok(Predicate::Not(vec![Predicate::Regex(CompiledRegex::new(
            re.pattern.as_str(),
            re.options.as_str(),
        )?)])),
        Bson::Document(d) if d.is_empty() => Err(DbError::bad_value("$not cannot be empty")),
        Bson::Document(d) => Ok(Predicate::Not(parse_predicates(path, d, depth + 1)?)),
        _ => Err(DbError::bad_value("$not needs a regex or a document")),
    }
}

fn parse_type(operand: &Bson) -> Result<Vec<TypeCode>, DbError> {
    match operand {
        Bson::Array(items) => items.iter().map(parse_type_code).collect(),
        other => Ok(vec![parse_type_code(other)?]),
    }
}

fn parse_type_code(v: &Bson) -> Result<TypeCode, DbError> {
    match v {
        Bson::String(alias) => TypeCode::from_alias(alias),
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => match whole_number(v) {
            Ok(code) => TypeCode::from_code(code),
            Err(_) => Err(DbError::bad_value(format!("Invalid numerical type code: {}", format_value(v)))),
        },
        _ => Err(DbError::bad_value("type must be represented as a number or a string")),
    }
}

fn parse_size(operand: &Bson) -> Result<i64, DbError> {
    let shown = format_value(operand);
    match whole_number(operand) {
        Ok(n) if n < 0 => Err(DbError::bad_value(format!(
            "Failed to parse $size. Expected a non-negative number in: $size: {shown}"
        ))),
        Ok(n) => Ok(n),
        Err(WholeNumberError::UnexpectedType) => Err(DbError::bad_value(format!(
            "Failed to parse $size. Expected a number in: $size: {shown}"
        ))),
        Err(WholeNumberError::NotWholeNumber) => Err(DbError::bad_value(format!(
            "Failed to parse $size. Expected an integer in: $size: {shown}"
        ))),
        Err(WholeNumberError::Infinity | WholeNumberError::OutOfRange) => Err(DbError::bad_value(format!(
            "Failed to parse $size. Cannot represent as a 64-bit integer: $size: {shown}"
        ))),
    }
}

fn parse_elem_match(path: &Path, operand: &Bson, depth: usize) -> Result<ElemMatch, DbError> {
    let Bson::Document(d) = operand else {
        return Err(DbError::bad_value("$elemMatch needs an Object"));
    };
    for key in d.keys() {
        if matches!(key.as_str(), "$where" | "$text" | "$expr") {
            return Err(DbError::bad_value(format!("{key} can only be applied to the top-level document")));
        }
    }
    let logical = d.keys().next().is_some_and(|k| matches!(k.as_str(), "$and" | "$or" | "$nor"));
    if is_operator_document(d) && !logical {
        Ok(ElemMatch::Value(parse_predicates(path, d, depth + 1)?))
    } else {
        Ok(ElemMatch::Document(Box::new(parse_filter_at(d, depth + 1)?)))
    }
}

fn parse_mod(operand: &Bson) -> Result<Predicate, DbError> {
    let Bson::Array(items) = operand else {
        return Err(DbError::bad_value("malformed mod, needs to be an array"));
    };
    let (divisor, remainder) = match items.as_slice() {
        [d, r] => (d, r),
        [] | [_] => return Err(DbError::bad_value("malformed mod, not enough elements")),
        _ => return Err(DbError::bad_value("malformed mod, too many elements")),
    };
    let divisor = mod_operand(divisor, "divisor")?;
    let remainder = mod_operand(remainder, "remainder")?;
    if divisor == 0 {
        return Err(DbError::bad_value("divisor cannot be 0"));
    }
    Ok(Predicate::Mod { divisor, remainder })
}

fn mod_operand(v: &Bson, what: &str) -> Result<i64, DbError> {
    match v {
        Bson::Int32(i) => Ok(i64::from(*i)),
        Bson::Int64(i) => Ok(*i),
        Bson::Double(f) if !f.is_finite() => Err(DbError::bad_value(format!(
            "malformed mod, {what} value is invalid :: caused by :: Unable to coerce NaN/Inf to integral type"
        ))),
        Bson::Double(f) => f64_trunc_to_i64(*f).ok_or_else(|| {
            DbError::bad_value(format!(
                "malformed mod, {what} value is invalid :: caused by :: Out of bounds coercing to integral value"
            ))
        }),
        _ => Err(DbError::bad_value(format!("malformed mod, {what} not a number"))),
    }
}

fn parse_bits(op: &str, operand: &Bson, test: BitsTest) -> Result<Predicate, DbError> {
    let shown = || format!("{op}: {}", format_value(operand));
    let mask = match operand {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => {
            let n = match whole_number(operand) {
                Ok(n) => n,
                Err(WholeNumberError::NotWholeNumber | WholeNumberError::Infinity) => {
                    return Err(DbError::failed_to_parse(format!("Expected an integer: {}", shown())));
                }
                Err(_) => {
                    return Err(DbError::failed_to_parse(format!(
                        "Cannot represent as a 64-bit integer: {}",
                        shown()
                    )));
                }
            };
            if n < 0 {
                return Err(DbError::failed_to_parse(format!("Expected a positive number in: {}", shown())));
            }
            (0_u64..64).filter(|bit| (n >> *bit) & 1 == 1).collect()
        }
        Bson::Array(items) => {
            let mut positions = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let pos = whole_number(item).map_err(|_| {
                    DbError::bad_value(format!("bit positions must be an integer but got: {i}: {}", format_value(item)))
                })?;
                let pos = u64::try_from(pos).map_err(|_| {
                    DbError::bad_value(format!("bit positions must be >= 0 but got: {i}: {}", format_value(item)))
                })?;
                positions.push(pos);
            }
            positions
        }
        Bson::Binary(bin) => binary_bit_positions(&bin.bytes),
        _ => {
            return Err(DbError::bad_value(format!(
                "{op} takes an Array, a number, or a BinData but received: {}",
                shown()
            )));
        }
    };
    Ok(Predicate::Bits { test, mask })
}

// Byte i holds bits 8*i..8*i+7, least significant first.
fn binary_bit_positions(bytes: &[u8]) -> Vec<u64> {
    let mut out = Vec::new();
    for (i, byte) in (0_u64..).zip(bytes) {
        for bit in 0..8 {
            if byte & (1 << bit) != 0 {
                out.push(i * 8 + bit);
            }
        }
    }
    out
}

/// Builds an [`UpdateSpec`] and validates it.
///
/// # Errors
/// `FailedToParse` for unknown modifiers or non-document operands,
/// `EmptyName`/`ConflictingUpdateOperators` for bad paths, `BadValue`/`TypeMismatch`
/// for operands that no document could accept.
pub fn parse_update(update: &Document) -> Result<UpdateSpec, DbError> {
    if !update.keys().any(|k| k.starts_with('$')) {
        return Ok(UpdateSpec::Replacement(update.clone()));
    }
    let mut ops: BTreeMap<UpdateOp, Vec<UpdateField>> = BTreeMap::new();
    for (name, operand) in update {
        let Some(op) = UpdateOp::from_name(name) else {
            return Err(DbError::failed_to_parse(format!(
                "Unknown modifier: {name}. Expected a valid update modifier or pipeline-style update specified as an array"
            )));
        };
        let Bson::Document(fields) = operand else {
            return Err(DbError::failed_to_parse(format!(
                "Modifiers operate on fields but we found type {} instead. For example: {{$mod: {{<field>: ...}}}} not {{{name}: {}}}",
                type_alias(operand),
                format_value(operand)
            )));
        };
        let entry = ops.entry(op).or_default();
        for (key, value) in fields {
            let path = Path::parse(key).map_err(|e| e.to_update_error(key))?;
            validate_operand(op, key, value)?;
            entry.push(UpdateField { path, operand: value.clone() });
        }
        entry.sort_by(|a, b| a.path.cmp(&b.path));
    }
    check_conflicts(&ops)?;
    Ok(UpdateSpec::Operators(ops))
}

/// # Errors
/// Returns an error if the JSON is not an object or the update is invalid.
pub fn parse_update_json(json: &str) -> Result<UpdateSpec, DbError> {
    parse_update(&parse_json_to_bson_document(json)?)
}

fn validate_operand(op: UpdateOp, key: &str, value: &Bson) -> Result<(), DbError> {
    let pair = || format!("{{{key}: {}}}", format_value(value));
    match op {
        UpdateOp::Inc | UpdateOp::Mul if !matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => {
            let verb = if op == UpdateOp::Inc { "increment" } else { "multiply" };
            Err(DbError::type_mismatch(format!("Cannot {verb} with non-numeric argument: {}", pair())))
        }
        UpdateOp::Rename => match value {
            Bson::String(to) if to == key => Err(DbError::bad_value(format!(
                "The source and target field for $rename must differ: {key}: \"{to}\""
            ))),
            Bson::String(to) => Path::parse(to).map(|_| ()).map_err(|e| e.to_update_error(to)),
            other => Err(DbError::bad_value(format!(
                "The 'to' field for $rename must be a string: {key}: {}",
                format_value(other)
            ))),
        },
        UpdateOp::CurrentDate => validate_current_date(value),
        UpdateOp::PullAll if !matches!(value, Bson::Array(_)) => Err(DbError::bad_value(format!(
            "$pullAll requires an array argument but was given a {}",
            type_alias(value)
        ))),
        UpdateOp::Push | UpdateOp::AddToSet => match value {
            Bson::Document(d) if d.keys().next().is_some_and(|k| k == "$each") => match d.get("$each") {
                Some(Bson::Array(_)) => Ok(()),
                Some(other) => Err(DbError::bad_value(format!(
                    "The argument to $each in {} must be an array but it was of type: {}",
                    op.name(),
                    type_alias(other)
                ))),
                None => Ok(()),
            },
            _ => Ok(()),
        },
        UpdateOp::Bit => validate_bit(value),
        _ => Ok(()),
    }
}

fn validate_current_date(value: &Bson) -> Result<(), DbError> {
    match value {
        Bson::Boolean(_) => Ok(()),
        Bson::Document(d) => {
            for k in d.keys() {
                if k != "$type" {
                    return Err(DbError::bad_value(format!("Unrecognized $currentDate option: {k}")));
                }
            }
            match d.get("$type") {
                Some(Bson::String(t)) if t == "date" || t == "timestamp" => Ok(()),
                _ => Err(DbError::bad_value(
                    "The '$type' string field is required to be 'date' or 'timestamp': {$currentDate: {field : {$type: 'date'}}}",
                )),
            }
        }
        other => Err(DbError::bad_value(format!(
            "{} is not valid type for $currentDate. Please use a boolean ('true') or a $type expression ({{$type: 'timestamp/date'}}).",
            type_alias(other)
        ))),
    }
}

fn validate_bit(value: &Bson) -> Result<(), DbError> {
    let Bson::Document(ops) = value else {
        return Err(DbError::bad_value(format!(
            "The $bit modifier is not compatible with a {}. You must pass in an embedded document: {{$bit: {{field: {{and/or/xor: #}}}}",
            type_alias(value)
        )));
    };
    if ops.is_empty() {
        return Err(DbError::bad_value(
            "You must pass in at least one bitwise operation. The format is: {$bit: {field: {and/or/xor: #}}",
        ));
    }
    for (name, operand) in ops {
        if !matches!(name.as_str(), "and" | "or" | "xor") {
            return Err(DbError::bad_value(format!(
                "The $bit modifier only supports 'and', 'or', and 'xor', not '{name}' which is an unknown operator: {{{name}: {}}}",
                format_value(operand)
            )));
        }
        if !matches!(operand, Bson::Int32(_) | Bson::Int64(_)) {
            return Err(DbError::bad_value(format!(
                "The $bit modifier field must be an Integer(32/64 bit); a '{}' is not supported here: {{{name}: {}}}",
                type_alias(operand),
                format_value(operand)
            )));
        }
    }
    Ok(())
}

fn check_conflicts(ops: &BTreeMap<UpdateOp, Vec<UpdateField>>) -> Result<(), DbError> {
    let mut seen: Vec<Path> = Vec::new();
    for (op, fields) in ops {
        for field in fields {
            let mut targets = vec![field.path.clone()];
            if *op == UpdateOp::Rename
                && let Bson::String(to) = &field.operand
            {
                targets.push(Path::parse(to).map_err(|e| e.to_update_error(to))?);
            }
            for target in targets {
                if let Some(prev) = seen.iter().find(|p| p.conflicts_with(&target)) {
                    let at = if prev.is_prefix_of(&target) { prev } else { &target };
                    return Err(DbError::command(
                        ErrorCode::ConflictingUpdateOperators,
                        format!("Updating the path '{target}' would create a conflict at '{at}'"),
                    ));
                }
                seen.push(target);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn err_of(filter: Document) -> DbError {
        parse_filter(&filter).unwrap_err()
    }

    #[test]
    fn empty_filter_is_true() {
        assert!(matches!(parse_filter(&doc! {}).unwrap(), Filter::True));
    }

    #[test]
    fn several_operators_on_one_field_become_an_and() {
        let f = parse_filter(&doc! {"a": {"$gt": 1, "$lt": 5}}).unwrap();
        let Filter::And(parts) = f else { panic!("expected And") };
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn literal_documents_are_equality() {
        let f = parse_filter(&doc! {"a": {"b": 1, "$gt": 2}}).unwrap();
        assert!(matches!(f, Filter::Field { pred: Predicate::Eq(_), .. }));
    }

    #[test]
    fn logical_operator_shapes() {
        assert_eq!(err_of(doc! {"$and": 1}).to_string(), "$and must be an array");
        assert_eq!(err_of(doc! {"$or": []}).to_string(), "$and/$or/$nor must be a nonempty array");
        assert_eq!(err_of(doc! {"$nor": [1]}).to_string(), "$or/$and/$nor entries need to be full objects");
        assert!(err_of(doc! {"$foo": 1}).to_string().starts_with("unknown top level operator: $foo."));
        assert_eq!(err_of(doc! {"$where": "x"}).code(), Some(ErrorCode::NotImplemented));
    }

    #[test]
    fn unknown_operator_and_bare_keys() {
        assert_eq!(err_of(doc! {"a": {"$gt": 1, "b": 2}}).to_string(), "unknown operator: b");
        assert_eq!(err_of(doc! {"a": {"$bogus": 1}}).to_string(), "unknown operator: $bogus");
    }

    #[test]
    fn in_and_not_shapes() {
        assert_eq!(err_of(doc! {"a": {"$in": 1}}).to_string(), "$in needs an array");
        assert_eq!(err_of(doc! {"a": {"$nin": {}}}).to_string(), "$nin needs an array");
        assert_eq!(err_of(doc! {"a": {"$in": [{"$gt": 1}]}}).to_string(), "cannot nest $ under $in");
        assert_eq!(err_of(doc! {"a": {"$not": {}}}).to_string(), "$not cannot be empty");
        assert_eq!(err_of(doc! {"a": {"$not": 1}}).to_string(), "$not needs a regex or a document");
    }

    #[test]
    fn size_messages() {
        assert_eq!(
            err_of(doc! {"a": {"$size": -1}}).to_string(),
            "Failed to parse $size. Expected a non-negative number in: $size: -1"
        );
        assert_eq!(
            err_of(doc! {"a": {"$size": 1.5}}).to_string(),
            "Failed to parse $size. Expected an integer in: $size: 1.5"
        );
        assert_eq!(
            err_of(doc! {"a": {"$size": "x"}}).to_string(),
            "Failed to parse $size. Expected a number in: $size: \"x\""
        );
        assert!(parse_filter(&doc! {"a": {"$size": 2.0}}).is_ok());
    }

    #[test]
    fn mod_messages() {
        let msg = |operand: Bson| err_of(doc! {"a": {"$mod": operand}}).to_string();
        assert_eq!(msg(Bson::Int32(1)), "malformed mod, needs to be an array");
        assert_eq!(msg(Bson::Array(vec![4.into()])), "malformed mod, not enough elements");
        assert_eq!(msg(Bson::Array(vec![4.into(), 1.into(), 2.into()])), "malformed mod, too many elements");
        assert_eq!(msg(Bson::Array(vec!["x".into(), 1.into()])), "malformed mod, divisor not a number");
        assert_eq!(msg(Bson::Array(vec![4.into(), "x".into()])), "malformed mod, remainder not a number");
        assert_eq!(
            msg(Bson::Array(vec![f64::NAN.into(), 1.into()])),
            "malformed mod, divisor value is invalid :: caused by :: Unable to coerce NaN/Inf to integral type"
        );
        assert_eq!(
            msg(Bson::Array(vec![4.into(), 1e300.into()])),
            "malformed mod, remainder value is invalid :: caused by :: Out of bounds coercing to integral value"
        );
        for zero in [0.1, -0.0, 5e-324] {
            assert_eq!(msg(Bson::Array(vec![zero.into(), 1.into()])), "divisor cannot be 0");
        }
    }

    #[test]
    fn regex_option_rules() {
        assert_eq!(err_of(doc! {"a": {"$options": "i"}}).to_string(), "$options needs a $regex");
        assert_eq!(err_of(doc! {"a": {"$regex": 1}}).to_string(), "$regex has to be a string");
        assert_eq!(err_of(doc! {"a": {"$regex": "x", "$options": 1}}).to_string(), "$options has to be a string");
        assert_eq!(
            err_of(doc! {"a": {"$regex": "x", "$options": "c"}}).code(),
            Some(ErrorCode::BadRegexOption)
        );
    }

    #[test]
    fn bits_masks() {
        let f = parse_filter(&doc! {"a": {"$bitsAllSet": 5}}).unwrap();
        let Filter::Field { pred: Predicate::Bits { mask, .. }, .. } = f else { panic!("expected bits") };
        assert_eq!(mask, vec![0, 2]);
        assert_eq!(
            err_of(doc! {"a": {"$bitsAnySet": -1}}).to_string(),
            "Expected a positive number in: $bitsAnySet: -1"
        );
        assert_eq!(err_of(doc! {"a": {"$bitsAnySet": 1.5}}).code(), Some(ErrorCode::FailedToParse));
        assert_eq!(
            err_of(doc! {"a": {"$bitsAllClear": [1, -2]}}).to_string(),
            "bit positions must be >= 0 but got: 1: -2"
        );
        assert!(
            err_of(doc! {"a": {"$bitsAllClear": "x"}})
                .to_string()
                .starts_with("$bitsAllClear takes an Array, a number, or a BinData")
        );
    }

    #[test]
    fn type_operand_forms() {
        assert!(parse_filter(&doc! {"a": {"$type": ["string", 16, 19]}}).is_ok());
        assert_eq!(err_of(doc! {"a": {"$type": 42}}).to_string(), "Invalid numerical type code: 42");
        assert_eq!(err_of(doc! {"a": {"$type": "float"}}).to_string(), "Unknown type name alias: float");
    }

    #[test]
    fn elem_match_shapes() {
        assert_eq!(err_of(doc! {"a": {"$elemMatch": 1}}).to_string(), "$elemMatch needs an Object");
        assert_eq!(
            err_of(doc! {"a": {"$elemMatch": {"$where": "x"}}}).to_string(),
            "$where can only be applied to the top-level document"
        );
        let f = parse_filter(&doc! {"a": {"$elemMatch": {"$or": [{"b": 1}]}}}).unwrap();
        assert!(matches!(f, Filter::Field { pred: Predicate::ElemMatch(ElemMatch::Document(_)), .. }));
    }

    #[test]
    fn update_modifier_errors() {
        let err = parse_update(&doc! {"$foo": {"a": 1}}).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::FailedToParse));
        assert!(err.to_string().starts_with("Unknown modifier: $foo."));
        let err = parse_update(&doc! {"$set": 1}).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Modifiers operate on fields but we found type int instead. For example: {$mod: {<field>: ...}} not {$set: 1}"
        );
        let err = parse_update(&doc! {"$inc": {"a": "x"}}).unwrap_err();
        assert_eq!(err.to_string(), "Cannot increment with non-numeric argument: {a: \"x\"}");
    }

    #[test]
    fn update_path_conflicts() {
        let err = parse_update(&doc! {"$set": {"a": 1}, "$inc": {"a.b": 1}}).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ConflictingUpdateOperators));
        assert_eq!(err.to_string(), "Updating the path 'a.b' would create a conflict at 'a'");
        let err = parse_update(&doc! {"$rename": {"x": "y"}, "$set": {"y": 1}}).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ConflictingUpdateOperators));
        let err = parse_update(&doc! {"$set": {"a..b": 1}}).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::EmptyName));
        assert_eq!(err.to_string(), "The update path 'a..b' contains an empty field name, which is not allowed.");
    }

    #[test]
    fn rename_and_current_date_operands() {
        let err = parse_update(&doc! {"$rename": {"v": "v"}}).unwrap_err();
        assert_eq!(err.to_string(), "The source and target field for $rename must differ: v: \"v\"");
        let err = parse_update(&doc! {"$rename": {"v": 1}}).unwrap_err();
        assert_eq!(err.to_string(), "The 'to' field for $rename must be a string: v: 1");
        let err = parse_update(&doc! {"$currentDate": {"d": {"$type": "date", "x": 1}}}).unwrap_err();
        assert_eq!(err.to_string(), "Unrecognized $currentDate option: x");
        let err = parse_update(&doc! {"$currentDate": {"d": 1}}).unwrap_err();
        assert!(err.to_string().starts_with("int is not valid type for $currentDate."));
    }

    #[test]
    fn bit_operand_errors() {
        let err = parse_update(&doc! {"$bit": {"a": {"nand": 1}}}).unwrap_err();
        assert!(err.to_string().starts_with("The $bit modifier only supports 'and', 'or', and 'xor', not 'nand'"));
        let err = parse_update(&doc! {"$bit": {"a": {}}}).unwrap_err();
        assert!(err.to_string().starts_with("You must pass in at least one bitwise operation."));
        let err = parse_update(&doc! {"$bit": {"a": {"and": 1.5}}}).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The $bit modifier field must be an Integer(32/64 bit); a 'double' is not supported here: {and: 1.5}"
        );
    }

    #[test]
    fn replacement_without_modifiers() {
        assert!(matches!(parse_update(&doc! {"a": 1}).unwrap(), UpdateSpec::Replacement(_)));
        assert!(matches!(parse_update(&doc! {}).unwrap(), UpdateSpec::Replacement(_)));
    }

    #[test]
    fn json_entry_points() {
        let f = parse_filter_json(r#"{"a": {"$gte": 3}}"#).unwrap();
        assert!(matches!(f, Filter::Field { pred: Predicate::Cmp { op: CmpOp::Gte, .. }, .. }));
        assert!(parse_filter_json("[1]").is_err());
        assert!(matches!(parse_update_json(r#"{"$set": {"a": 1}}"#).unwrap(), UpdateSpec::Operators(_)));
    }
}
