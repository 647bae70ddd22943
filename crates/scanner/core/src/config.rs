//! Tuning knobs of the indexing pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of the [`crate::Scanner`] and its queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Maximum number of RPC fetches in flight.
    pub max_fetch_concurrency: usize,
    /// Maximum number of bulk inserts in flight.
    pub max_storage_concurrency: usize,
    /// Maximum number of rows per bulk insert.
    pub batch_size: usize,
    /// Sync queue backlog above which no new fetches are issued.
    pub max_sync_backlog: usize,
    /// Number of times an item may fail to persist before it is dropped.
    pub max_persist_retries: u32,
    /// Pause between two iterations of the sync loop.
    pub sync_interval: Duration,
    /// Pause of the fetch dispatcher when there is nothing to fetch.
    pub idle_interval: Duration,
    /// Pause of the fetch dispatcher while the sync backlog is too large.
    pub throttle_interval: Duration,
    /// Interval between chain tip polls in live mode.
    pub live_poll_interval: Duration,
    /// Number of block numbers queued ahead of the fetchers.
    pub feed_window: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_fetch_concurrency: 100,
            max_storage_concurrency: 20,
            batch_size: 200,
            max_sync_backlog: 10_000,
            max_persist_retries: 3,
            sync_interval: Duration::from_millis(500),
            idle_interval: Duration::from_secs(1),
            throttle_interval: Duration::from_millis(250),
            live_poll_interval: Duration::from_secs(5),
            feed_window: 1_000,
        }
    }
}
