use bson::{Bson, Document, doc};
use docmatch::errors::ErrorCode;
use docmatch::query::{eval_filter, matches, parse_filter, parse_filter_json};

fn matching_ids(docs: &[Document], filter: &Document) -> Vec<String> {
    let parsed = parse_filter(filter).unwrap();
    docs.iter()
        .filter(|d| eval_filter(d, &parsed).unwrap())
        .map(|d| d.get_str("_id").unwrap().to_string())
        .collect()
}

fn scalars() -> Vec<Document> {
    vec![
        doc! {"_id": "int32", "value": 42},
        doc! {"_id": "int64", "value": 42_i64},
        doc! {"_id": "double-whole", "value": 42.0},
        doc! {"_id": "double", "value": 42.13},
        doc! {"_id": "string", "value": "42"},
        doc! {"_id": "null", "value": Bson::Null},
        doc! {"_id": "missing"},
        doc! {"_id": "array", "value": [1, 42]},
        doc! {"_id": "nan", "value": f64::NAN},
    ]
}

#[test]
fn eq_double_matches_every_numeric_representation() {
    let docs = vec![
        doc! {"_id": "int32", "value": 42},
        doc! {"_id": "double-whole", "value": 42.0},
        doc! {"_id": "string", "value": "42"},
    ];
    assert_eq!(matching_ids(&docs, &doc! {"value": {"$eq": 42.0}}), ["int32", "double-whole"]);
}

#[test]
fn eq_over_mixed_scalars() {
    let ids = matching_ids(&scalars(), &doc! {"value": 42});
    assert_eq!(ids, ["int32", "int64", "double-whole", "array"]);
    assert_eq!(matching_ids(&scalars(), &doc! {"value": null}), ["null", "missing"]);
    assert_eq!(matching_ids(&scalars(), &doc! {"value": f64::NAN}), ["nan"]);
}

#[test]
fn ordering_stays_inside_the_type_bracket() {
    let ids = matching_ids(&scalars(), &doc! {"value": {"$gt": 42}});
    assert_eq!(ids, ["double"]);
    let ids = matching_ids(&scalars(), &doc! {"value": {"$lte": 1}});
    assert_eq!(ids, ["array"]);
    assert_eq!(matching_ids(&scalars(), &doc! {"value": {"$gte": "4"}}), ["string"]);
}

#[test]
fn min_and_max_key_cross_brackets() {
    let ids = matching_ids(&scalars(), &doc! {"value": {"$gt": Bson::MinKey}});
    assert!(ids.contains(&"string".to_string()));
    assert!(ids.contains(&"int32".to_string()));
    let ids = matching_ids(&scalars(), &doc! {"value": {"$lt": Bson::MaxKey}});
    assert!(ids.contains(&"double".to_string()));
}

#[test]
fn large_int64_is_not_equal_to_nearby_double() {
    let big = (1_i64 << 61) + 1;
    #[allow(clippy::cast_precision_loss)]
    let near = big as f64;
    let d = doc! {"v": big};
    assert!(!matches(&d, &doc! {"v": near}).unwrap());
    assert!(matches(&d, &doc! {"v": big}).unwrap());
    assert!(matches(&d, &doc! {"v": {"$gt": near}}).unwrap());
}

#[test]
fn nested_paths_and_array_indexes() {
    let d = doc! {
        "_id": 1,
        "order": {"lines": [{"sku": "a", "qty": 2}, {"sku": "b", "qty": 9}]},
        "grid": [[1, 2], [3, 4]],
    };
    assert!(matches(&d, &doc! {"order.lines.sku": "b"}).unwrap());
    assert!(matches(&d, &doc! {"order.lines.1.qty": 9}).unwrap());
    assert!(!matches(&d, &doc! {"order.lines.2.qty": {"$exists": true}}).unwrap());
    assert!(matches(&d, &doc! {"grid.1": [3, 4]}).unwrap());
    assert!(matches(&d, &doc! {"order.lines": {"$elemMatch": {"sku": "a", "qty": {"$lt": 5}}}}).unwrap());
    assert!(!matches(&d, &doc! {"order.lines": {"$elemMatch": {"sku": "b", "qty": {"$lt": 5}}}}).unwrap());
}

#[test]
fn json_filters_accept_extended_json() {
    let f = parse_filter_json(r#"{"n": {"$numberLong": "7"}, "d": {"$gt": {"$date": "2020-01-01T00:00:00Z"}}}"#).unwrap();
    let d = doc! {"n": 7, "d": bson::DateTime::from_millis(1_700_000_000_000)};
    assert!(eval_filter(&d, &f).unwrap());
}

#[test]
fn filter_errors_carry_codes_and_messages() {
    let cases: Vec<(Document, ErrorCode, &str)> = vec![
        (doc! {"a": {"$mod": [5e-324, 1]}}, ErrorCode::BadValue, "divisor cannot be 0"),
        (doc! {"a": {"$mod": [-0.0, 1]}}, ErrorCode::BadValue, "divisor cannot be 0"),
        (doc! {"a": {"$mod": [1]}}, ErrorCode::BadValue, "malformed mod, not enough elements"),
        (doc! {"a": {"$foo": 1}}, ErrorCode::BadValue, "unknown operator: $foo"),
        (doc! {"$or": []}, ErrorCode::BadValue, "$and/$or/$nor must be a nonempty array"),
        (doc! {"a": {"$regex": "x", "$options": "c"}}, ErrorCode::BadRegexOption, " invalid flag in regex options: c"),
        (doc! {"$where": "1"}, ErrorCode::NotImplemented, "$where is not implemented yet"),
        (doc! {"$expr": {"$frobnicate": 1}}, ErrorCode::InvalidPipelineOperator, "Unrecognized expression '$frobnicate'"),
    ];
    for (filter, code, msg) in cases {
        let err = matches(&doc! {"a": 1}, &filter).unwrap_err();
        assert_eq!(err.code(), Some(code), "{filter}");
        assert_eq!(err.to_string(), msg, "{filter}");
    }
}

#[test]
fn regex_reports_invalid_patterns() {
    let err = matches(&doc! {"a": "x"}, &doc! {"a": {"$regex": "("}}).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::RegexMissingParen));
    assert!(err.to_string().starts_with("Regular expression is invalid"));
}
