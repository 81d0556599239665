use bson::Bson;

use crate::errors::{DbError, ErrorCode};

const VALID_FLAGS: &str = "imsx";

/// A `$regex` operand with its options, compiled once at parse time.
#[derive(Debug, Clone)]
pub struct CompiledRegex {
    pattern: String,
    options: String,
    #[cfg(feature = "regex")]
    re: regex::Regex,
}

impl CompiledRegex {
    /// # Errors
    /// `Location51108` for an unknown flag, `Location51091` when the pattern does not compile,
    /// `NotImplemented` when built without the `regex` feature.
    pub fn new(pattern: &str, options: &str) -> Result<Self, DbError> {
        if let Some(c) = options.chars().find(|c| !VALID_FLAGS.contains(*c)) {
            return Err(DbError::command(
                ErrorCode::BadRegexOption,
                format!(" invalid flag in regex options: {c}"),
            ));
        }
        Self::compile(pattern, options)
    }

    #[cfg(feature = "regex")]
    fn compile(pattern: &str, options: &str) -> Result<Self, DbError> {
        let re = regex::RegexBuilder::new(pattern)
            .case_insensitive(options.contains('i'))
            .multi_line(options.contains('m'))
            .dot_matches_new_line(options.contains('s'))
            .ignore_whitespace(options.contains('x'))
            .build()
            .map_err(|e| {
                let full = e.to_string();
                let reason = full.rsplit("error: ").next().unwrap_or(&full).trim().to_string();
                DbError::command(ErrorCode::RegexMissingParen, format!("Regular expression is invalid: {reason}"))
            })?;
        Ok(Self { pattern: pattern.to_string(), options: options.to_string(), re })
    }

    #[cfg(not(feature = "regex"))]
    fn compile(_pattern: &str, _options: &str) -> Result<Self, DbError> {
        Err(DbError::not_implemented("$regex is not supported in this build"))
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn options(&self) -> &str {
        &self.options
    }

    /// Strings match by search; stored regexes match when pattern and options are identical.
    #[must_use]
    pub fn is_match(&self, v: &Bson) -> bool {
        match v {
            Bson::String(s) | Bson::Symbol(s) => self.search(s),
            Bson::RegularExpression(r) => {
                r.pattern.as_str() == self.pattern && r.options.as_str() == self.options
            }
            _ => false,
        }
    }

    #[cfg(feature = "regex")]
    fn search(&self, s: &str) -> bool {
        self.re.is_match(s)
    }

    #[cfg(not(feature = "regex"))]
    fn search(&self, _s: &str) -> bool {
        false
    }
}
