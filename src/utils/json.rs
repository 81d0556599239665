use crate::errors::DbError;

/// Convert a serde_json::Value that must be an object into a bson::Document.
/// Extended JSON forms such as `{"$oid": ...}` become their BSON types.
///
/// # Errors
/// `FailedToParse` when the value is not an object or holds malformed extended JSON.
pub fn json_value_to_bson_document(val: &serde_json::Value) -> Result<bson::Document, DbError> {
    let obj = val.as_object().ok_or_else(|| DbError::failed_to_parse("expected JSON object"))?;
    bson::Document::try_from(obj.clone()).map_err(|e| DbError::failed_to_parse(e.to_string()))
}

/// Parse a JSON string into a bson::Document. The JSON must be a top-level object.
///
/// # Errors
/// `Json` for malformed JSON, otherwise as [`json_value_to_bson_document`].
pub fn parse_json_to_bson_document(json: &str) -> Result<bson::Document, DbError> {
    let val: serde_json::Value = serde_json::from_str(json)?;
    json_value_to_bson_document(&val)
}

/// Render a document as relaxed JSON for command-line output.
///
/// # Errors
/// `Json` if serialization fails.
pub fn document_to_json(doc: &bson::Document) -> Result<String, DbError> {
    Ok(serde_json::to_string(doc)?)
}
