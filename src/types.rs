//! Crate-wide type aliases.

/// An insertion-ordered BSON document.
pub type Document = bson::Document;

pub type CollectionName = String;

/// Storage-assigned record id; larger ids were inserted later.
pub type RecordId = i64;
