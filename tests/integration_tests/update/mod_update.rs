use bson::{Bson, doc};
use docmatch::errors::ErrorCode;
use docmatch::query::{UpdateOptions, apply_update, apply_update_with_options, parse_update_json, update_document};

#[test]
fn inc_at_int64_max_fails_and_leaves_document() {
    let mut d = doc! {"_id": "x", "v": i64::MAX, "other": 1};
    let before = d.clone();
    let err = update_document(&mut d, &doc! {"$inc": {"other": 1, "v": 1}}).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::BadValue));
    assert!(err.to_string().starts_with("Failed to apply $inc operations to current value ((NumberLong)"));
    assert_eq!(d, before);
}

#[test]
fn mul_by_two_at_int64_max_fails() {
    let mut d = doc! {"_id": 1, "v": i64::MAX};
    let before = d.clone();
    let err = update_document(&mut d, &doc! {"$mul": {"v": 2}}).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::BadValue));
    assert_eq!(d, before);
}

#[test]
fn numeric_promotion() {
    let mut d = doc! {"_id": 1, "i": 2, "l": 2_i64, "f": 2.0};
    update_document(&mut d, &doc! {"$inc": {"i": 1, "l": 1, "f": 1}}).unwrap();
    assert_eq!(d.get("i"), Some(&Bson::Int32(3)));
    assert_eq!(d.get("l"), Some(&Bson::Int64(3)));
    assert_eq!(d.get("f"), Some(&Bson::Double(3.0)));
    update_document(&mut d, &doc! {"$mul": {"i": 2_i64, "l": 0.5}}).unwrap();
    assert_eq!(d.get("i"), Some(&Bson::Int64(6)));
    assert_eq!(d.get("l"), Some(&Bson::Double(1.5)));
}

#[test]
fn rename_overwrites_target_of_another_type() {
    let mut d = doc! {"_id": 1, "v": {"foo": "value", "bar": [1, 2]}};
    let out = update_document(&mut d, &doc! {"$rename": {"v.foo": "v.bar"}}).unwrap();
    assert_eq!(d, doc! {"_id": 1, "v": {"bar": "value"}});
    assert!(out.touched.contains("v.foo"));
    assert!(out.touched.contains("v.bar"));
}

#[test]
fn rename_to_itself_is_rejected() {
    let mut d = doc! {"_id": 1, "v": 1};
    let err = update_document(&mut d, &doc! {"$rename": {"v": "v"}}).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::BadValue));
    assert_eq!(err.to_string(), "The source and target field for $rename must differ: v: \"v\"");
}

#[test]
fn rename_into_array_element_is_not_viable() {
    let mut d = doc! {"_id": 1, "a": [1, 2], "x": 5};
    let before = d.clone();
    let err = update_document(&mut d, &doc! {"$rename": {"x": "a.1"}}).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PathNotViable));
    assert_eq!(err.to_string(), "Cannot create field '1' in element {a: [ 1, 2 ]}");
    assert_eq!(d, before);
}

#[test]
fn rename_out_of_array_element_leaves_no_hole() {
    let mut d = doc! {"_id": 1, "a": [1, 2]};
    let before = d.clone();
    let err = update_document(&mut d, &doc! {"$rename": {"a.0": "b"}}).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PathNotViable));
    assert_eq!(err.to_string(), "cannot use path 'a.0' to traverse the document");
    assert_eq!(d, before);
}

#[test]
fn rename_through_scalar_target_is_not_viable() {
    let mut d = doc! {"_id": 1, "s": 3, "x": 5};
    let err = update_document(&mut d, &doc! {"$rename": {"x": "s.y"}}).unwrap_err();
    assert_eq!(err.to_string(), "Cannot create field 'y' in element {s: 3}");
    let out = update_document(&mut d, &doc! {"$rename": {"x": "m.y"}}).unwrap();
    assert!(out.modified);
    assert_eq!(d, doc! {"_id": 1, "s": 3, "m": {"y": 5}});
}

#[test]
fn conflicting_paths_are_rejected_before_applying() {
    let mut d = doc! {"_id": 1, "a": {"b": 1}};
    let err = update_document(&mut d, &doc! {"$set": {"a": 1}, "$inc": {"a.b": 1}}).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ConflictingUpdateOperators));
    assert_eq!(d, doc! {"_id": 1, "a": {"b": 1}});
}

#[test]
fn operators_apply_in_a_fixed_order() {
    // $inc runs before $set regardless of key order in the update document.
    let mut d = doc! {"_id": 1, "n": 1};
    update_document(&mut d, &doc! {"$set": {"m": 10}, "$inc": {"n": 1}}).unwrap();
    assert_eq!(d, doc! {"_id": 1, "n": 2, "m": 10});
}

#[test]
fn upsert_applies_set_on_insert() {
    let spec = parse_update_json(r#"{"$set": {"status": "new"}, "$setOnInsert": {"created": true}}"#).unwrap();
    let mut existing = doc! {"_id": 1, "status": "old"};
    apply_update(&mut existing, &spec).unwrap();
    assert_eq!(existing, doc! {"_id": 1, "status": "new"});

    let mut inserted = doc! {"_id": 2};
    let out = apply_update_with_options(&mut inserted, &spec, UpdateOptions { is_insert: true }).unwrap();
    assert_eq!(inserted, doc! {"_id": 2, "status": "new", "created": true});
    assert_eq!(out.touched.len(), 2);
}

#[test]
fn array_updates_pad_and_traverse() {
    let mut d = doc! {"_id": 1, "a": [1]};
    update_document(&mut d, &doc! {"$set": {"a.3": 9}}).unwrap();
    assert_eq!(d.get_array("a").unwrap(), &vec![Bson::Int32(1), Bson::Null, Bson::Null, Bson::Int32(9)]);
    update_document(&mut d, &doc! {"$unset": {"a.0": ""}}).unwrap();
    assert_eq!(d.get_array("a").unwrap()[0], Bson::Null);
    let err = update_document(&mut d, &doc! {"$set": {"a.x": 1}}).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PathNotViable));
}

#[test]
fn no_op_updates_are_not_modifications() {
    let mut d = doc! {"_id": 1, "a": 1, "lo": 1, "tags": ["x"]};
    let out =
        update_document(&mut d, &doc! {"$set": {"a": 1}, "$addToSet": {"tags": "x"}, "$min": {"lo": 5}}).unwrap();
    assert!(!out.modified);
    assert!(out.touched.is_empty());
}

#[test]
fn update_json_errors() {
    let err = parse_update_json(r#"{"$inc": {"a": "one"}}"#).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TypeMismatch));
    assert_eq!(err.to_string(), "Cannot increment with non-numeric argument: {a: \"one\"}");
}
