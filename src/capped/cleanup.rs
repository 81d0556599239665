use log::{debug, error, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::config::CappedConfig;
use super::store::{CappedInfo, CappedStore};
use crate::errors::DbError;
use crate::types::{CollectionName, RecordId};
use crate::utils::logger::CAPPED_TARGET;
use crate::utils::num::u64_to_usize;

/// Result of one cleanup pass over a single collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub collection: CollectionName,
    pub deleted: u64,
    pub bytes_freed: u64,
}

/// How many of `count` documents a pass removes at `percentage`.
#[must_use]
pub fn victim_count(count: u64, percentage: u8) -> u64 {
    count.saturating_mul(u64::from(percentage.clamp(1, 100))) / 100
}

/// The oldest `count * percentage / 100` ids of `records` (which must be oldest first).
#[must_use]
pub fn select_victims(records: &[RecordId], count: u64, percentage: u8) -> Vec<RecordId> {
    let n = u64_to_usize(victim_count(count, percentage)).unwrap_or(usize::MAX);
    records.iter().take(n).copied().collect()
}

/// Trims one capped collection if it has reached its size or document cap.
///
/// # Errors
/// Propagates store failures; nothing is compacted after a failed delete.
pub fn cleanup_collection(
    store: &dyn CappedStore,
    coll: &CappedInfo,
    cfg: &CappedConfig,
) -> Result<CleanupStats, DbError> {
    let mut stats = CleanupStats { collection: coll.name.clone(), ..CleanupStats::default() };
    let before = store.stats(&coll.name)?;
    if !coll.is_exceeded(&before) {
        return Ok(stats);
    }

    let limit = victim_count(before.count, cfg.percentage());
    let oldest = store.oldest_records(&coll.name, u64_to_usize(limit).unwrap_or(usize::MAX))?;
    let victims = select_victims(&oldest, before.count, cfg.percentage());
    if victims.is_empty() {
        return Ok(stats);
    }
    stats.deleted = store.delete_records(&coll.name, &victims)?;
    if cfg.compact_after_cleanup {
        store.compact(&coll.name)?;
    }
    let after = store.stats(&coll.name)?;
    // Concurrent inserts can grow the collection during the pass.
    stats.bytes_freed = before.size_bytes.saturating_sub(after.size_bytes);

    info!(
        target: CAPPED_TARGET,
        "collection={} deleted={} bytes_freed={}",
        stats.collection, stats.deleted, stats.bytes_freed
    );
    Ok(stats)
}

/// Runs [`cleanup_collection`] over every capped collection the store reports.
///
/// # Errors
/// Stops at the first store failure.
pub fn cleanup_all(store: &dyn CappedStore, cfg: &CappedConfig) -> Result<Vec<CleanupStats>, DbError> {
    debug!(target: CAPPED_TARGET, "cleanup started percentage={}", cfg.percentage());
    let mut out = Vec::new();
    for coll in store.list_capped()? {
        out.push(cleanup_collection(store, &coll, cfg)?);
    }
    debug!(target: CAPPED_TARGET, "cleanup finished collections={}", out.len());
    Ok(out)
}

#[derive(Default, Debug)]
pub struct CleanupMetrics {
    pub passes: AtomicU64,
    pub failures: AtomicU64,
    pub docs_deleted: AtomicU64,
    pub bytes_freed: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CleanupMetricsSnapshot {
    pub passes: u64,
    pub failures: u64,
    pub docs_deleted: u64,
    pub bytes_freed: u64,
}

impl CleanupMetrics {
    pub fn snapshot(&self) -> CleanupMetricsSnapshot {
        CleanupMetricsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            docs_deleted: self.docs_deleted.load(Ordering::Relaxed),
            bytes_freed: self.bytes_freed.load(Ordering::Relaxed),
        }
    }

    fn record(&self, result: &Result<Vec<CleanupStats>, DbError>) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(all) => {
                for s in all {
                    self.docs_deleted.fetch_add(s.deleted, Ordering::Relaxed);
                    self.bytes_freed.fetch_add(s.bytes_freed, Ordering::Relaxed);
                }
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Background task that trims capped collections on a fixed period.
pub struct CappedCleaner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    metrics: Arc<CleanupMetrics>,
}

impl CappedCleaner {
    /// Spawns the cleaner on the current tokio runtime, ticking every `cfg.interval()`.
    #[must_use]
    pub fn spawn(store: Arc<dyn CappedStore>, cfg: CappedConfig) -> Self {
        let period = cfg.interval();
        Self::spawn_with_period(store, cfg, period)
    }

    /// Like [`spawn`](Self::spawn) with an explicit tick period.
    #[must_use]
    pub fn spawn_with_period(store: Arc<dyn CappedStore>, cfg: CappedConfig, period: Duration) -> Self {
        let (tx, mut rx) = watch::channel(false);
        let metrics = Arc::new(CleanupMetrics::default());
        let task_metrics = Arc::clone(&metrics);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let result = cleanup_all(store.as_ref(), &cfg);
                        if let Err(e) = &result {
                            error!(target: CAPPED_TARGET, "failed to clean up capped collections: {e}");
                        }
                        task_metrics.record(&result);
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(target: CAPPED_TARGET, "cleaner stopped");
        });
        Self { shutdown: tx, handle, metrics }
    }

    #[must_use]
    pub fn metrics(&self) -> CleanupMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Signals the task to stop and waits for it.
    ///
    /// # Errors
    /// `Storage` if the task panicked or was cancelled.
    pub async fn shutdown(self) -> Result<CleanupMetricsSnapshot, DbError> {
        // A send error means the task already exited.
        let _ = self.shutdown.send(true);
        self.handle.await.map_err(|e| DbError::Storage(format!("capped cleaner task failed: {e}")))?;
        Ok(self.metrics.snapshot())
    }
}
