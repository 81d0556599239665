//! Value model: type brackets, type codes, numeric views and message formatting.
pub mod core;
pub mod format;
pub mod types;

pub use core::Number;
pub use format::format_value;
pub use types::{TypeBracket, TypeCode, type_alias};
