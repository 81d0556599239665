use bson::{Bson, Document, doc};
use thiserror::Error;

/// Server error codes surfaced to clients as the `code`/`codeName` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    BadValue,
    FailedToParse,
    TypeMismatch,
    PathNotViable,
    ConflictingUpdateOperators,
    EmptyName,
    ImmutableField,
    InvalidPipelineOperator,
    NotImplemented,
    RegexOptions,
    RegexMissingParen,
    BadRegexOption,
}

impl ErrorCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::BadValue => 2,
            Self::FailedToParse => 9,
            Self::TypeMismatch => 14,
            Self::PathNotViable => 28,
            Self::ConflictingUpdateOperators => 40,
            Self::EmptyName => 56,
            Self::ImmutableField => 66,
            Self::InvalidPipelineOperator => 168,
            Self::NotImplemented => 238,
            Self::RegexOptions => 51075,
            Self::RegexMissingParen => 51091,
            Self::BadRegexOption => 51108,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BadValue => "BadValue",
            Self::FailedToParse => "FailedToParse",
            Self::TypeMismatch => "TypeMismatch",
            Self::PathNotViable => "PathNotViable",
            Self::ConflictingUpdateOperators => "ConflictingUpdateOperators",
            Self::EmptyName => "EmptyName",
            Self::ImmutableField => "ImmutableField",
            Self::InvalidPipelineOperator => "InvalidPipelineOperator",
            Self::NotImplemented => "NotImplemented",
            Self::RegexOptions => "Location51075",
            Self::RegexMissingParen => "Location51091",
            Self::BadRegexOption => "Location51108",
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    /// A command-level failure carrying the exact client-visible message.
    #[error("{msg}")]
    Command { code: ErrorCode, msg: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DbError {
    pub fn command(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::Command { code, msg: msg.into() }
    }

    pub fn bad_value(msg: impl Into<String>) -> Self {
        Self::command(ErrorCode::BadValue, msg)
    }

    pub fn failed_to_parse(msg: impl Into<String>) -> Self {
        Self::command(ErrorCode::FailedToParse, msg)
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::command(ErrorCode::TypeMismatch, msg)
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::command(ErrorCode::NotImplemented, msg)
    }

    /// The server error code, if this is a command error.
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Command { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Renders the `{ok, errmsg, code, codeName}` reply document.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let (code, name) = match self {
            Self::Command { code, .. } => (code.code(), code.name()),
            _ => (1, "InternalError"),
        };
        doc! {
            "ok": Bson::Double(0.0),
            "errmsg": self.to_string(),
            "code": code,
            "codeName": name,
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
