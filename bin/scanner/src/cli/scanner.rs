//! Tuning flags of the indexing pipeline.

use chainscan_core::ScannerConfig;
use clap::Parser;
use std::time::Duration;

/// Flags mapping onto [`ScannerConfig`].
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
pub struct ScannerArgs {
    /// Maximum number of RPC fetches in flight.
    #[arg(long, global = true, default_value_t = 100, env = "CHAINSCAN_MAX_FETCH_CONCURRENCY")]
    pub max_fetch_concurrency: usize,
    /// Maximum number of bulk inserts in flight.
    #[arg(long, global = true, default_value_t = 20, env = "CHAINSCAN_MAX_STORAGE_CONCURRENCY")]
    pub max_storage_concurrency: usize,
    /// Maximum number of rows per bulk insert.
    #[arg(long, global = true, default_value_t = 200, env = "CHAINSCAN_BATCH_SIZE")]
    pub batch_size: usize,
    /// Number of fetched items waiting to be written above which fetching pauses.
    #[arg(long, global = true, default_value_t = 10_000, env = "CHAINSCAN_MAX_SYNC_BACKLOG")]
    pub max_sync_backlog: usize,
    /// Number of failed writes after which an item is dropped.
    #[arg(long, global = true, default_value_t = 3, env = "CHAINSCAN_MAX_PERSIST_RETRIES")]
    pub max_persist_retries: u32,
    /// Pause between two iterations of the sync loop, in milliseconds.
    #[arg(long, global = true, default_value_t = 500, env = "CHAINSCAN_SYNC_INTERVAL")]
    pub sync_interval: u64,
    /// Pause of the fetcher when nothing is queued, in milliseconds.
    #[arg(long, global = true, default_value_t = 1_000, env = "CHAINSCAN_IDLE_INTERVAL")]
    pub idle_interval: u64,
    /// Pause of the fetcher while the sync backlog is too large, in milliseconds.
    #[arg(long, global = true, default_value_t = 250, env = "CHAINSCAN_THROTTLE_INTERVAL")]
    pub throttle_interval: u64,
    /// Interval between chain tip polls in live mode, in milliseconds.
    #[arg(long, global = true, default_value_t = 5_000, env = "CHAINSCAN_LIVE_POLL_INTERVAL")]
    pub live_poll_interval: u64,
    /// Number of block numbers queued ahead of the fetchers.
    #[arg(long, global = true, default_value_t = 1_000, env = "CHAINSCAN_FEED_WINDOW")]
    pub feed_window: u64,
}

impl ScannerArgs {
    /// Builds the pipeline configuration.
    pub const fn config(&self) -> ScannerConfig {
        ScannerConfig {
            max_fetch_concurrency: self.max_fetch_concurrency,
            max_storage_concurrency: self.max_storage_concurrency,
            batch_size: self.batch_size,
            max_sync_backlog: self.max_sync_backlog,
            max_persist_retries: self.max_persist_retries,
            sync_interval: Duration::from_millis(self.sync_interval),
            idle_interval: Duration::from_millis(self.idle_interval),
            throttle_interval: Duration::from_millis(self.throttle_interval),
            live_poll_interval: Duration::from_millis(self.live_poll_interval),
            feed_window: self.feed_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        scanner: ScannerArgs,
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let cli = TestCli::parse_from(["test"]);
        assert_eq!(cli.scanner.config(), ScannerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cli = TestCli::parse_from([
            "test",
            "--batch-size",
            "50",
            "--max-fetch-concurrency",
            "8",
            "--sync-interval",
            "100",
        ]);
        let config = cli.scanner.config();

        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_fetch_concurrency, 8);
        assert_eq!(config.sync_interval, Duration::from_millis(100));
        assert_eq!(config.feed_window, 1_000);
    }
}
