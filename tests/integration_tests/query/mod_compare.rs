use bson::{Bson, doc, oid::ObjectId};
use docmatch::query::{CompareResult, compare, compare_order, values_equal};
use std::cmp::Ordering;

#[test]
fn brackets_order_across_types() {
    let ascending = vec![
        Bson::MinKey,
        Bson::Null,
        Bson::Int32(5),
        Bson::String("a".into()),
        Bson::Document(doc! {"a": 1}),
        Bson::Array(vec![Bson::Int32(1)]),
        Bson::ObjectId(ObjectId::from_bytes([1; 12])),
        Bson::Boolean(false),
        Bson::DateTime(bson::DateTime::from_millis(0)),
        Bson::MaxKey,
    ];
    for pair in ascending.windows(2) {
        assert_eq!(compare(&pair[0], &pair[1]), CompareResult::Less, "{} < {}", pair[0], pair[1]);
        assert_eq!(compare(&pair[1], &pair[0]), CompareResult::Greater);
    }
}

#[test]
fn numbers_compare_exactly() {
    assert_eq!(compare(&Bson::Int32(1), &Bson::Double(1.0)), CompareResult::Equal);
    assert_eq!(compare(&Bson::Int64(i64::MAX), &Bson::Double(9_223_372_036_854_775_807.0)), CompareResult::Less);
    assert_eq!(compare(&Bson::Double(-0.0), &Bson::Int32(0)), CompareResult::Equal);
    assert_eq!(compare(&Bson::Double(f64::NAN), &Bson::Int32(0)), CompareResult::Incomparable);
    assert_eq!(compare(&Bson::Double(f64::NAN), &Bson::Double(f64::NAN)), CompareResult::Equal);
    assert_eq!(compare_order(&Bson::Double(f64::NAN), &Bson::Double(f64::NEG_INFINITY)), Ordering::Less);
}

#[test]
fn document_and_array_order_matter() {
    assert!(!values_equal(&Bson::Document(doc! {"a": 1, "b": 2}), &Bson::Document(doc! {"b": 2, "a": 1})));
    assert!(!values_equal(&Bson::Array(vec![1.into(), 2.into()]), &Bson::Array(vec![2.into(), 1.into()])));
    assert!(values_equal(&Bson::Document(doc! {"a": [1, {"b": 2.0}]}), &Bson::Document(doc! {"a": [1_i64, {"b": 2}]})));
    assert_eq!(
        compare(&Bson::Array(vec![1.into()]), &Bson::Array(vec![1.into(), 0.into()])),
        CompareResult::Less
    );
}

#[test]
fn strings_compare_bytewise() {
    assert_eq!(compare(&Bson::String("B".into()), &Bson::String("a".into())), CompareResult::Less);
    assert_eq!(compare(&Bson::String("é".into()), &Bson::String("z".into())), CompareResult::Greater);
}
