use bson::doc;
use docmatch::capped::{CappedCleaner, CappedConfig, CappedStore, MemoryStore, cleanup_all};
use std::sync::Arc;
use std::time::Duration;

fn store_with(collections: &[(&str, u64, Option<u64>, i64)]) -> MemoryStore {
    let s = MemoryStore::new();
    for (name, max_size, max_docs, docs) in collections {
        s.create_capped(name, *max_size, *max_docs);
        for n in 0..*docs {
            s.insert(name, doc! {"n": n, "payload": "x".repeat(32)}).unwrap();
        }
    }
    s
}

#[test]
fn only_collections_over_their_caps_are_trimmed() {
    let s = store_with(&[("events", 1 << 30, Some(10), 40), ("quiet", 1 << 30, Some(100), 40)]);
    let cfg = CappedConfig { cleanup_percentage: 50, ..CappedConfig::default() };
    let stats = cleanup_all(&s, &cfg).unwrap();
    assert_eq!(stats.len(), 2);
    let events = stats.iter().find(|st| st.collection == "events").unwrap();
    let quiet = stats.iter().find(|st| st.collection == "quiet").unwrap();
    assert_eq!(events.deleted, 20);
    assert!(events.bytes_freed > 0);
    assert_eq!(quiet.deleted, 0);
    assert_eq!(s.stats("quiet").unwrap().count, 40);
    // Survivors are the newest documents.
    assert_eq!(s.documents("events")[0].get_i64("n").unwrap(), 20);
}

#[test]
fn config_from_toml_drives_cleanup() {
    let cfg = docmatch::config::EngineConfig::from_toml_str("[capped]\ncleanup_percentage = 25\ncompact_after_cleanup = false\n")
        .unwrap();
    let s = store_with(&[("c", 1 << 30, Some(8), 8)]);
    let stats = cleanup_all(&s, &cfg.capped).unwrap();
    assert_eq!(stats[0].deleted, 2);
    assert_eq!(stats[0].bytes_freed, 0);
}

#[tokio::test]
async fn cleaner_task_trims_until_stopped() {
    let store = Arc::new(store_with(&[("log", 1 << 30, Some(20), 60)]));
    let cfg = CappedConfig { cleanup_percentage: 50, ..CappedConfig::default() };
    let cleaner = CappedCleaner::spawn_with_period(store.clone(), cfg, Duration::from_millis(10));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.stats("log").unwrap().count >= 20 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let metrics = cleaner.shutdown().await.unwrap();
    assert!(store.stats("log").unwrap().count < 20);
    assert!(metrics.docs_deleted >= 40);
    let count_after_stop = store.stats("log").unwrap().count;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(store.stats("log").unwrap().count, count_after_stop);
}
