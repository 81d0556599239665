use bson::{Bson, doc};
use docmatch::query::{CompareResult, compare, compare_order, matches};
use proptest::prelude::*;

fn any_scalar() -> impl Strategy<Value = Bson> {
    prop_oneof![
        Just(Bson::Null),
        Just(Bson::MinKey),
        Just(Bson::MaxKey),
        any::<bool>().prop_map(Bson::Boolean),
        any::<i32>().prop_map(Bson::Int32),
        any::<i64>().prop_map(Bson::Int64),
        any::<f64>().prop_map(Bson::Double),
        "[a-z]{0,6}".prop_map(Bson::String),
        any::<i64>().prop_map(|ms| Bson::DateTime(bson::DateTime::from_millis(ms))),
    ]
}

fn any_value() -> impl Strategy<Value = Bson> {
    any_scalar().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Bson::Array),
            proptest::collection::vec(("[a-c]", inner), 0..3)
                .prop_map(|kv| Bson::Document(kv.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 128,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn prop_every_value_equals_itself(v in any_value()) {
        prop_assert_eq!(compare(&v, &v), CompareResult::Equal);
        let d = doc! {"x": v.clone()};
        let q = doc! {"x": {"$eq": v}};
        prop_assert!(matches(&d, &q).unwrap());
    }

    #[test]
    fn prop_order_is_antisymmetric(a in any_value(), b in any_value()) {
        let ab = compare(&a, &b);
        let ba = compare(&b, &a);
        let flipped = match ab {
            CompareResult::Less => CompareResult::Greater,
            CompareResult::Greater => CompareResult::Less,
            other => other,
        };
        prop_assert_eq!(ba, flipped);
        prop_assert_eq!(compare_order(&a, &b), compare_order(&b, &a).reverse());
    }

    #[test]
    fn prop_int64_beyond_double_precision_is_exact(hi in (1_i64 << 53)..(i64::MAX / 2), off in 1_i64..64) {
        let exact = hi | 1;
        #[allow(clippy::cast_precision_loss)]
        let approx = exact as f64;
        // Odd values above 2^53 are never exactly representable as doubles.
        prop_assert_ne!(compare(&Bson::Int64(exact), &Bson::Double(approx)), CompareResult::Equal);
        prop_assert_eq!(compare(&Bson::Int64(exact), &Bson::Int64(exact)), CompareResult::Equal);
        prop_assert_eq!(compare(&Bson::Int64(exact), &Bson::Int64(exact + off)), CompareResult::Less);
    }

    #[test]
    fn prop_int32_and_double_agree(i in any::<i32>()) {
        prop_assert_eq!(compare(&Bson::Int32(i), &Bson::Double(f64::from(i))), CompareResult::Equal);
        prop_assert_eq!(compare(&Bson::Int32(i), &Bson::Int64(i64::from(i))), CompareResult::Equal);
    }
}
