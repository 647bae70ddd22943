//! Prometheus metrics of the indexing pipeline.

/// Metric names and helpers for the indexing pipeline.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const FETCH_RETRIES_TOTAL: &'static str = "chainscan_fetch_retries_total";
    pub(crate) const SYNC_BATCH_FAILURES_TOTAL: &'static str =
        "chainscan_sync_batch_failures_total";
    pub(crate) const SYNC_ITEMS_DROPPED_TOTAL: &'static str = "chainscan_sync_items_dropped_total";
    pub(crate) const SYNC_ITEMS_PERSISTED_TOTAL: &'static str =
        "chainscan_sync_items_persisted_total";
    pub(crate) const SYNC_BATCH_DURATION_SECONDS: &'static str =
        "chainscan_sync_batch_duration_seconds";
    pub(crate) const ACCOUNT_CACHE_HITS_TOTAL: &'static str = "chainscan_account_cache_hits_total";
    pub(crate) const ACCOUNT_CACHE_MISSES_TOTAL: &'static str =
        "chainscan_account_cache_misses_total";
    pub(crate) const LATEST_SYNCED_BLOCK: &'static str = "chainscan_latest_synced_block";

    /// Label value for block work items.
    pub(crate) const BLOCK: &'static str = "block";
    /// Label value for transaction work items.
    pub(crate) const TRANSACTION: &'static str = "transaction";

    /// Describes and zeroes every metric.
    pub(crate) fn init() {
        Self::describe();
        Self::zero();
    }

    fn describe() {
        metrics::describe_counter!(
            Self::FETCH_RETRIES_TOTAL,
            metrics::Unit::Count,
            "Total number of failed fetches that were re-enqueued",
        );

        metrics::describe_counter!(
            Self::SYNC_BATCH_FAILURES_TOTAL,
            metrics::Unit::Count,
            "Total number of bulk inserts that failed",
        );

        metrics::describe_counter!(
            Self::SYNC_ITEMS_DROPPED_TOTAL,
            metrics::Unit::Count,
            "Total number of items dropped after exhausting their persist retries",
        );

        metrics::describe_counter!(
            Self::SYNC_ITEMS_PERSISTED_TOTAL,
            metrics::Unit::Count,
            "Total number of items written by bulk inserts",
        );

        metrics::describe_histogram!(
            Self::SYNC_BATCH_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Latency of bulk inserts",
        );

        metrics::describe_counter!(
            Self::ACCOUNT_CACHE_HITS_TOTAL,
            metrics::Unit::Count,
            "Total number of account lookups served by the cache",
        );

        metrics::describe_counter!(
            Self::ACCOUNT_CACHE_MISSES_TOTAL,
            metrics::Unit::Count,
            "Total number of account lookups that went to storage",
        );

        metrics::describe_gauge!(
            Self::LATEST_SYNCED_BLOCK,
            metrics::Unit::Count,
            "Highest block number covered by a successful block batch",
        );
    }

    fn zero() {
        for kind in [Self::BLOCK, Self::TRANSACTION] {
            metrics::counter!(Self::FETCH_RETRIES_TOTAL, "kind" => kind).increment(0);
            metrics::counter!(Self::SYNC_BATCH_FAILURES_TOTAL, "kind" => kind).increment(0);
            metrics::counter!(Self::SYNC_ITEMS_DROPPED_TOTAL, "kind" => kind).increment(0);
            metrics::counter!(Self::SYNC_ITEMS_PERSISTED_TOTAL, "kind" => kind).increment(0);
            metrics::histogram!(Self::SYNC_BATCH_DURATION_SECONDS, "kind" => kind).record(0.0);
        }

        metrics::counter!(Self::ACCOUNT_CACHE_HITS_TOTAL).increment(0);
        metrics::counter!(Self::ACCOUNT_CACHE_MISSES_TOTAL).increment(0);
        metrics::gauge!(Self::LATEST_SYNCED_BLOCK).set(0.0);
    }

    pub(crate) fn record_fetch_retry(kind: &'static str) {
        metrics::counter!(Self::FETCH_RETRIES_TOTAL, "kind" => kind).increment(1);
    }

    /// Records the outcome and latency of one bulk insert.
    pub(crate) fn record_batch<T, E>(
        kind: &'static str,
        len: usize,
        seconds: f64,
        result: &Result<T, E>,
    ) {
        metrics::histogram!(Self::SYNC_BATCH_DURATION_SECONDS, "kind" => kind).record(seconds);
        match result {
            Ok(_) => {
                metrics::counter!(Self::SYNC_ITEMS_PERSISTED_TOTAL, "kind" => kind)
                    .increment(len as u64);
            }
            Err(_) => {
                metrics::counter!(Self::SYNC_BATCH_FAILURES_TOTAL, "kind" => kind).increment(1);
            }
        }
    }

    pub(crate) fn record_dropped(kind: &'static str) {
        metrics::counter!(Self::SYNC_ITEMS_DROPPED_TOTAL, "kind" => kind).increment(1);
    }

    pub(crate) fn record_cache_lookup(hit: bool) {
        if hit {
            metrics::counter!(Self::ACCOUNT_CACHE_HITS_TOTAL).increment(1);
        } else {
            metrics::counter!(Self::ACCOUNT_CACHE_MISSES_TOTAL).increment(1);
        }
    }

    pub(crate) fn record_latest_block(number: u64) {
        metrics::gauge!(Self::LATEST_SYNCED_BLOCK).set(number as f64);
    }
}
