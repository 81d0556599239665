use docmatch::errors::{DbError, ErrorCode};

#[test]
fn codes_and_names() {
    let table = [
        (ErrorCode::BadValue, 2, "BadValue"),
        (ErrorCode::FailedToParse, 9, "FailedToParse"),
        (ErrorCode::TypeMismatch, 14, "TypeMismatch"),
        (ErrorCode::PathNotViable, 28, "PathNotViable"),
        (ErrorCode::ConflictingUpdateOperators, 40, "ConflictingUpdateOperators"),
        (ErrorCode::EmptyName, 56, "EmptyName"),
        (ErrorCode::ImmutableField, 66, "ImmutableField"),
        (ErrorCode::InvalidPipelineOperator, 168, "InvalidPipelineOperator"),
        (ErrorCode::NotImplemented, 238, "NotImplemented"),
        (ErrorCode::RegexOptions, 51075, "Location51075"),
        (ErrorCode::RegexMissingParen, 51091, "Location51091"),
        (ErrorCode::BadRegexOption, 51108, "Location51108"),
    ];
    for (code, n, name) in table {
        assert_eq!(code.code(), n);
        assert_eq!(code.name(), name);
    }
}

#[test]
fn reply_document_for_update_errors() {
    let mut d = bson::doc! {"_id": 1, "a": 1};
    let err = docmatch::update_document(&mut d, &bson::doc! {"$set": {"_id": 2}}).unwrap_err();
    let reply = err.to_document();
    assert_eq!(reply.get_f64("ok").unwrap(), 0.0);
    assert_eq!(reply.get_i32("code").unwrap(), 66);
    assert_eq!(reply.get_str("codeName").unwrap(), "ImmutableField");
    assert_eq!(
        reply.get_str("errmsg").unwrap(),
        "Performing an update on the path '_id' would modify the immutable field '_id'"
    );
}

#[test]
fn io_and_config_errors_display() {
    let e: DbError = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found").into();
    assert_eq!(e.to_string(), "I/O error: file not found");
    assert_eq!(DbError::Config("bad".into()).to_string(), "Config error: bad");
    assert!(DbError::Storage("x".into()).code().is_none());
}
