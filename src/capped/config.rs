use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the background capped-collection cleaner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CappedConfig {
    pub cleanup_interval_secs: u64,
    /// Share of a collection's documents removed per pass; clamped to 1..=100 on use.
    pub cleanup_percentage: u8,
    pub compact_after_cleanup: bool,
}

impl Default for CappedConfig {
    fn default() -> Self {
        Self { cleanup_interval_secs: 60, cleanup_percentage: 10, compact_after_cleanup: true }
    }
}

impl CappedConfig {
    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.cleanup_percentage.clamp(1, 100)
    }

    /// Tick period; never shorter than one second.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}
