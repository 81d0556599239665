//! Background trimming of capped collections.

pub mod cleanup;
pub mod config;
pub mod store;

pub use cleanup::{
    CappedCleaner, CleanupMetrics, CleanupMetricsSnapshot, CleanupStats, cleanup_all, cleanup_collection,
    select_victims, victim_count,
};
pub use config::CappedConfig;
pub use store::{CappedInfo, CappedStore, CollectionStats, MemoryStore};
