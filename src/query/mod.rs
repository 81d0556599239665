// Submodules for separation of concerns
mod compare;
mod eval;
mod expr;
mod parse;
mod path;
mod pattern;
mod types;
mod update;

// Public API re-exports
pub use compare::{compare, compare_order, values_equal};
pub use eval::{eval_filter, matches};
pub use expr::{ExprOp, Expression, evaluate, is_truthy, parse_expression};
pub use parse::{parse_filter, parse_filter_json, parse_update, parse_update_json};
pub use path::{Path, PathError, find_values, get_path, has_path, remove_path, set_path};
pub use pattern::CompiledRegex;
pub use types::{
    BitsTest, CmpOp, CompareResult, ElemMatch, Filter, InItem, Predicate, UpdateField, UpdateOp,
    UpdateOptions, UpdateOutcome, UpdateSpec,
};
pub use update::{apply_update, apply_update_with_options, update_document};
