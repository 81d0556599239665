use docmatch::logger::{CAPPED_TARGET, configure_logging};
use std::fs;
use tempfile::tempdir;

// The only test in this binary that installs the global logger.
#[test]
fn configure_logging_routes_capped_target_to_its_own_file() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("logs");
    configure_logging(Some(&base), Some("debug"), Some(3)).unwrap();
    log::info!("hello app");
    log::info!(target: CAPPED_TARGET, "collection=events deleted=5 bytes_freed=120");
    log::logger().flush();

    assert!(base.join("app.log").exists());
    let capped = fs::read_to_string(base.join("capped.log")).unwrap();
    assert!(capped.contains("docmatch::capped - collection=events deleted=5"));
    assert!(!base.join("dev6.log").exists());
}

#[test]
fn dev6_sink_captures_evaluation_traces() {
    let _sink = docmatch::utils::devlog::enable_thread_sink();
    docmatch::matches(&bson::doc! {"a": 1}, &bson::doc! {"a": 2}).unwrap();
    let mut d = bson::doc! {"_id": 1};
    docmatch::update_document(&mut d, &bson::doc! {"$set": {"b": 1}}).unwrap();
    let logs = docmatch::utils::devlog::drain();
    assert!(logs.iter().any(|l| l.contains("\"op\":\"match\"") && l.contains("\"matched\":false")));
    assert!(logs.iter().any(|l| l.contains("\"op\":\"update\"") && l.contains("\"modified\":true")));
}
