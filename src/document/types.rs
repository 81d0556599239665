use bson::Bson;

use crate::errors::DbError;

/// Coarse type category used for cross-type ordering. Variant order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeBracket {
    MinKey,
    Null,
    Numbers,
    String,
    Document,
    Array,
    Binary,
    ObjectId,
    Bool,
    DateTime,
    Timestamp,
    Regex,
    DbPointer,
    JavaScript,
    JavaScriptWithScope,
    MaxKey,
}

impl TypeBracket {
    #[must_use]
    pub fn of(v: &Bson) -> Self {
        match v {
            Bson::MinKey => Self::MinKey,
            Bson::Null | Bson::Undefined => Self::Null,
            Bson::Double(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Decimal128(_) => Self::Numbers,
            Bson::String(_) | Bson::Symbol(_) => Self::String,
            Bson::Document(_) => Self::Document,
            Bson::Array(_) => Self::Array,
            Bson::Binary(_) => Self::Binary,
            Bson::ObjectId(_) => Self::ObjectId,
            Bson::Boolean(_) => Self::Bool,
            Bson::DateTime(_) => Self::DateTime,
            Bson::Timestamp(_) => Self::Timestamp,
            Bson::RegularExpression(_) => Self::Regex,
            Bson::DbPointer(_) => Self::DbPointer,
            Bson::JavaScriptCode(_) => Self::JavaScript,
            Bson::JavaScriptCodeWithScope(_) => Self::JavaScriptWithScope,
            Bson::MaxKey => Self::MaxKey,
        }
    }
}

/// MongoDB type alias of a value, as used by `$type` and in error messages.
#[must_use]
pub fn type_alias(v: &Bson) -> &'static str {
    match v {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Binary(_) => "binData",
        Bson::Undefined => "undefined",
        Bson::ObjectId(_) => "objectId",
        Bson::Boolean(_) => "bool",
        Bson::DateTime(_) => "date",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::DbPointer(_) => "dbPointer",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::Symbol(_) => "symbol",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Timestamp(_) => "timestamp",
        Bson::Int64(_) => "long",
        Bson::Decimal128(_) => "decimal",
        Bson::MinKey => "minKey",
        Bson::MaxKey => "maxKey",
    }
}

/// Operand of the `$type` query operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    Double,
    String,
    Object,
    Array,
    BinData,
    ObjectId,
    Bool,
    Date,
    Null,
    Regex,
    Int,
    Timestamp,
    Long,
    Decimal,
    MinKey,
    MaxKey,
    /// Not a real BSON type: matches double, int, long and decimal.
    Number,
}

const ALIASES: &[(&str, TypeCode)] = &[
    ("double", TypeCode::Double),
    ("string", TypeCode::String),
    ("object", TypeCode::Object),
    ("array", TypeCode::Array),
    ("binData", TypeCode::BinData),
    ("objectId", TypeCode::ObjectId),
    ("bool", TypeCode::Bool),
    ("date", TypeCode::Date),
    ("null", TypeCode::Null),
    ("regex", TypeCode::Regex),
    ("int", TypeCode::Int),
    ("timestamp", TypeCode::Timestamp),
    ("long", TypeCode::Long),
    ("decimal", TypeCode::Decimal),
    ("minKey", TypeCode::MinKey),
    ("maxKey", TypeCode::MaxKey),
    ("number", TypeCode::Number),
];

impl TypeCode {
    /// # Errors
    /// Returns `BadValue` for codes that name no BSON type.
    pub fn from_code(code: i64) -> Result<Self, DbError> {
        Ok(match code {
            1 => Self::Double,
            2 => Self::String,
            3 => Self::Object,
            4 => Self::Array,
            5 => Self::BinData,
            7 => Self::ObjectId,
            8 => Self::Bool,
            9 => Self::Date,
            10 => Self::Null,
            11 => Self::Regex,
            16 => Self::Int,
            17 => Self::Timestamp,
            18 => Self::Long,
            19 => Self::Decimal,
            -1 => Self::MinKey,
            127 => Self::MaxKey,
            -128 => Self::Number,
            other => {
                return Err(DbError::bad_value(format!("Invalid numerical type code: {other}")));
            }
        })
    }

    /// # Errors
    /// Returns `BadValue` for unknown aliases.
    pub fn from_alias(alias: &str) -> Result<Self, DbError> {
        ALIASES
            .iter()
            .find(|(name, _)| *name == alias)
            .map(|(_, code)| *code)
            .ok_or_else(|| DbError::bad_value(format!("Unknown type name alias: {alias}")))
    }

    #[must_use]
    pub fn alias(self) -> &'static str {
        ALIASES.iter().find(|(_, c)| *c == self).map_or("unknown", |(name, _)| name)
    }

    /// Whether `v` itself (not its elements) has this type.
    #[must_use]
    pub fn matches(self, v: &Bson) -> bool {
        match self {
            Self::Number => {
                matches!(v, Bson::Double(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Decimal128(_))
            }
            code => type_alias(v) == code.alias(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn numbers_share_one_bracket() {
        assert_eq!(TypeBracket::of(&Bson::Int32(1)), TypeBracket::of(&Bson::Double(2.5)));
        assert_eq!(TypeBracket::of(&Bson::Int64(1)), TypeBracket::Numbers);
        assert!(TypeBracket::of(&Bson::Null) < TypeBracket::of(&Bson::Int32(0)));
        assert!(TypeBracket::of(&Bson::String("a".into())) < TypeBracket::of(&Bson::Document(doc! {})));
        assert!(TypeBracket::of(&Bson::Boolean(true)) < TypeBracket::of(&Bson::DateTime(bson::DateTime::now())));
        assert!(TypeBracket::of(&Bson::MaxKey) > TypeBracket::of(&Bson::Timestamp(bson::Timestamp { time: 1, increment: 1 })));
    }

    #[test]
    fn type_codes_and_aliases() {
        assert_eq!(TypeCode::from_code(16).unwrap(), TypeCode::Int);
        assert_eq!(TypeCode::from_alias("objectId").unwrap(), TypeCode::ObjectId);
        let err = TypeCode::from_code(42).unwrap_err();
        assert_eq!(err.to_string(), "Invalid numerical type code: 42");
        let err = TypeCode::from_alias("float").unwrap_err();
        assert_eq!(err.to_string(), "Unknown type name alias: float");
    }

    #[test]
    fn number_alias_matches_all_numeric_types() {
        assert!(TypeCode::Number.matches(&Bson::Int32(1)));
        assert!(TypeCode::Number.matches(&Bson::Int64(1)));
        assert!(TypeCode::Number.matches(&Bson::Double(1.0)));
        assert!(!TypeCode::Number.matches(&Bson::String("1".into())));
        assert!(TypeCode::Long.matches(&Bson::Int64(1)));
        assert!(!TypeCode::Long.matches(&Bson::Int32(1)));
    }
}
