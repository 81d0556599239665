//! MongoDB-compatible filter and update evaluation over BSON documents.
//!
//! ```
//! use bson::doc;
//!
//! let doc = doc! {"_id": 1, "tags": ["a", "b"], "n": 41};
//! assert!(docmatch::matches(&doc, &doc! {"tags": "b", "n": {"$lt": 42}}).unwrap());
//!
//! let mut doc = doc;
//! let out = docmatch::update_document(&mut doc, &doc! {"$inc": {"n": 1}}).unwrap();
//! assert!(out.modified);
//! assert_eq!(doc.get_i32("n").unwrap(), 42);
//! ```

pub mod capped;
pub mod config;
pub mod document;
pub mod errors;
pub mod query;
pub mod types;
pub mod utils;

pub use utils::logger;

pub use errors::{DbError, ErrorCode};
pub use query::{
    Filter, Path, UpdateOptions, UpdateOutcome, UpdateSpec, apply_update, apply_update_with_options, compare,
    compare_order, eval_filter, find_values, matches, parse_filter, parse_update, update_document,
};

// Build-time generated list of compiled features
mod built {
    include!(concat!(env!("OUT_DIR"), "/compiled_features.rs"));
}

/// Cargo features this build was compiled with.
#[must_use]
pub fn compiled_features() -> &'static [&'static str] {
    built::COMPILED_FEATURES
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BuildInfo {
    pub package_name: String,
    pub package_version: String,
    pub compiled_features: Vec<String>,
}

#[must_use]
pub fn build_info() -> BuildInfo {
    BuildInfo {
        package_name: env!("CARGO_PKG_NAME").to_string(),
        package_version: env!("CARGO_PKG_VERSION").to_string(),
        compiled_features: compiled_features().iter().map(|s| (*s).to_string()).collect(),
    }
}
