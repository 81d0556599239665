use bson::{Bson, doc};
use docmatch::query::{matches, update_document};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 64,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn prop_failed_inc_never_mutates(start in any::<i64>(), by in any::<i64>()) {
        let mut d = doc! {"_id": 1, "v": start, "w": 0};
        let before = d.clone();
        match update_document(&mut d, &doc! {"$inc": {"w": 1, "v": by}}) {
            Ok(_) => {
                prop_assert_eq!(d.get("v"), Some(&Bson::Int64(start.checked_add(by).unwrap())));
                prop_assert_eq!(d.get("w"), Some(&Bson::Int32(1)));
            }
            Err(_) => {
                prop_assert!(start.checked_add(by).is_none());
                prop_assert_eq!(d, before);
            }
        }
    }

    #[test]
    fn prop_set_then_match(path in "[a-d](\\.[a-d]){0,2}", v in any::<i32>()) {
        let mut d = doc! {"_id": 1};
        update_document(&mut d, &doc! {"$set": {path.clone(): v}}).unwrap();
        let q = doc! {path.clone(): v};
        prop_assert!(matches(&d, &q).unwrap());
        let out = update_document(&mut d, &doc! {"$set": {path.clone(): v}}).unwrap();
        prop_assert!(!out.modified);
        update_document(&mut d, &doc! {"$unset": {path.clone(): ""}}).unwrap();
        let q = doc! {path: {"$exists": false}};
        prop_assert!(matches(&d, &q).unwrap());
    }
}
