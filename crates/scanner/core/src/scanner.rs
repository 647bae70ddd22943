//! Drives a sync run from the stored watermark.

use crate::{
    DownloadQueue, ScannerConfig, ScannerError, SyncQueue, blocking::run_blocking,
    metrics::Metrics,
};
use alloy_primitives::{Address, U256};
use chainscan_rpc::ChainProvider;
use chainscan_storage::ScanStorage;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

/// How far a sync run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    /// Sync the next `n` blocks after the watermark, then return.
    Blocks(u64),
    /// Follow the chain tip until the process is stopped.
    Live,
}

/// Summary of a fixed-range sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// First block of the range.
    pub from: u64,
    /// Last block of the range, after clamping to the chain tip.
    pub to: u64,
    /// Blocks written during the run.
    pub blocks: u64,
    /// Transactions written during the run.
    pub transactions: u64,
    /// Blocks dropped after exhausting their persist retries.
    pub failed_blocks: u64,
    /// Transactions dropped after exhausting their persist retries.
    pub failed_transactions: u64,
    /// The watermark once the run drained.
    pub latest_synced_block: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// Indexes blocks and transactions from a node into storage.
///
/// The scanner owns both pipeline stages. Block numbers are fed to the [`DownloadQueue`], whose
/// results flow into the [`SyncQueue`] and from there into storage.
#[derive(Debug)]
pub struct Scanner<P, S> {
    provider: Arc<P>,
    storage: Arc<S>,
    config: ScannerConfig,
    sync: SyncQueue<S>,
    download: DownloadQueue<P, S>,
    initialized: bool,
}

impl<P, S> Scanner<P, S>
where
    P: ChainProvider + 'static,
    S: ScanStorage + 'static,
{
    /// Wires the pipeline stages together. Nothing is fetched until [`Self::run_sync`].
    pub fn new(provider: Arc<P>, storage: Arc<S>, config: ScannerConfig) -> Self {
        Metrics::init();
        let sync = SyncQueue::new(Arc::clone(&storage), &config);
        let download = DownloadQueue::new(Arc::clone(&provider), sync.clone(), &config);
        Self { provider, storage, config, sync, download, initialized: false }
    }

    /// Loads the stored watermark and checks that the node answers.
    ///
    /// Returns the watermark. Fails with [`ScannerError::Unreachable`] if the node cannot be
    /// reached.
    pub async fn init(&mut self) -> Result<u64, ScannerError> {
        let watermark =
            run_blocking(&self.storage, |storage| storage.latest_synced_block()).await?;

        let tip = self.provider.block_number().await.map_err(|err| {
            error!(target: "scanner", %err, "Node unreachable");
            ScannerError::Unreachable(err)
        })?;

        self.sync.advance_latest_block(watermark);
        self.initialized = true;
        info!(target: "scanner", watermark, tip, "Scanner initialised");
        Ok(self.sync.latest_block())
    }

    /// Returns the highest block number covered by a successful block batch.
    pub fn latest_synced_block(&self) -> u64 {
        self.sync.latest_block()
    }

    /// Runs a sync.
    ///
    /// With [`SyncTarget::Blocks`] the blocks after the watermark are fetched and written, and
    /// the call returns once both queues have drained. The range is clamped to the chain tip
    /// observed at the start. With [`SyncTarget::Live`] the chain tip is followed and the call
    /// never returns successfully.
    pub async fn run_sync(&self, target: SyncTarget) -> Result<SyncReport, ScannerError> {
        if !self.initialized {
            return Err(ScannerError::NotInitialized);
        }

        match target {
            SyncTarget::Blocks(count) => self.sync_blocks(count).await,
            SyncTarget::Live => self.follow_tip().await,
        }
    }

    async fn sync_blocks(&self, count: u64) -> Result<SyncReport, ScannerError> {
        let started = Instant::now();
        let watermark = self.sync.latest_block();
        let tip = self.provider.block_number().await.map_err(ScannerError::Unreachable)?;

        let from = watermark + 1;
        let requested = watermark.saturating_add(count);
        let to = requested.min(tip);
        if to < requested {
            info!(target: "scanner", requested, tip, "Clamping sync range to the chain tip");
        }

        let before = self.sync.totals();
        if count == 0 || from > to {
            info!(target: "scanner", watermark, tip, "Nothing to sync");
        } else {
            info!(target: "scanner", from, to, "Starting sync");
            self.feed(from, to).await;
            self.download.wait_idle().await;
            self.sync.wait_idle().await;
        }

        let totals = self.sync.totals().since(&before);
        let report = SyncReport {
            from,
            to,
            blocks: totals.blocks,
            transactions: totals.transactions,
            failed_blocks: totals.failed_blocks,
            failed_transactions: totals.failed_transactions,
            latest_synced_block: self.sync.latest_block(),
            elapsed: started.elapsed(),
        };

        info!(
            target: "scanner",
            from,
            to,
            blocks = report.blocks,
            transactions = report.transactions,
            failed_blocks = report.failed_blocks,
            failed_transactions = report.failed_transactions,
            latest_synced_block = report.latest_synced_block,
            elapsed = ?report.elapsed,
            "Sync finished"
        );
        Ok(report)
    }

    async fn follow_tip(&self) -> Result<SyncReport, ScannerError> {
        let mut next = self.sync.latest_block() + 1;
        info!(target: "scanner", from = next, "Following the chain tip");

        loop {
            match self.provider.block_number().await {
                Ok(tip) if tip >= next => {
                    info!(target: "scanner", from = next, to = tip, "New blocks");
                    self.feed(next, tip).await;
                    next = tip + 1;
                }
                Ok(_) => {}
                Err(err) => warn!(target: "scanner", %err, "Failed to read the chain tip"),
            }
            tokio::time::sleep(self.config.live_poll_interval).await;
        }
    }

    /// Queues `from..=to`, keeping at most `feed_window` block numbers waiting.
    async fn feed(&self, from: u64, to: u64) {
        let window = self.config.feed_window.max(1);
        let mut next = from;

        while next <= to {
            let backlog = self.download.blocks_len() as u64;
            if backlog >= window {
                tokio::time::sleep(self.config.idle_interval).await;
                continue;
            }

            let end = to.min(next + (window - backlog) - 1);
            for number in next..=end {
                self.download.add_block(number);
            }
            next = end + 1;
        }
    }

    /// Returns the latest balance of `address`, or `None` if the node call failed.
    pub async fn balance(&self, address: Address) -> Option<U256> {
        match self.provider.balance(address).await {
            Ok(balance) => Some(balance),
            Err(err) => {
                error!(target: "scanner", %address, %err, "Failed to fetch balance");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryChain, InMemoryStorage};
    use chainscan_rpc::{MockChainProvider, RpcError};
    use chainscan_storage::{AccountStorage, BlockStorage, SettingsStorage, TransactionStorage};
    use chainscan_types::{Block, Settings};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> ScannerConfig {
        ScannerConfig {
            max_fetch_concurrency: 8,
            max_storage_concurrency: 2,
            batch_size: 16,
            sync_interval: Duration::from_millis(5),
            idle_interval: Duration::from_millis(10),
            throttle_interval: Duration::from_millis(5),
            live_poll_interval: Duration::from_millis(10),
            feed_window: 4,
            ..Default::default()
        }
    }

    async fn scanner<P: ChainProvider + 'static>(
        provider: P,
        storage: Arc<InMemoryStorage>,
    ) -> Scanner<P, InMemoryStorage> {
        let mut scanner = Scanner::new(Arc::new(provider), storage, config());
        scanner.init().await.unwrap();
        scanner
    }

    #[tokio::test]
    async fn test_run_sync_before_init_fails() {
        let storage = Arc::new(InMemoryStorage::default());
        let scanner = Scanner::new(Arc::new(InMemoryChain::default()), storage, config());

        let result = scanner.run_sync(SyncTarget::Blocks(1)).await;
        assert!(matches!(result, Err(ScannerError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_init_unreachable_node() {
        let chain = InMemoryChain::default();
        chain.set_unreachable(true);
        let storage = Arc::new(InMemoryStorage::default());
        let mut scanner = Scanner::new(Arc::new(chain), storage, config());

        assert!(matches!(scanner.init().await, Err(ScannerError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_sync_two_blocks_from_watermark() {
        let chain = InMemoryChain::with_empty_blocks(100);
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);
        let carol = Address::repeat_byte(0xca);
        let hashes = [
            chain.insert_transaction(101, alice, Some(bob), None),
            chain.insert_transaction(101, bob, Some(carol), None),
            chain.insert_transaction(102, carol, Some(alice), None),
            chain.insert_transaction(102, alice, Some(bob), None),
        ];
        chain.insert_block(103);
        let storage = Arc::new(InMemoryStorage::with_watermark(100));
        let scanner = scanner(chain, Arc::clone(&storage)).await;

        let report = scanner.run_sync(SyncTarget::Blocks(2)).await.unwrap();

        assert_eq!((report.from, report.to), (101, 102));
        assert_eq!(report.blocks, 2);
        assert_eq!(report.transactions, 4);
        assert_eq!(report.latest_synced_block, 102);
        assert_eq!(storage.latest_synced_block().unwrap(), 102);

        let numbers: Vec<u64> = storage.blocks().iter().map(|row| row.number).collect();
        assert_eq!(numbers, vec![101, 102]);
        for hash in hashes {
            assert!(storage.get_transaction(hash).unwrap().is_some());
        }
        // Three distinct addresses, each resolved exactly once.
        assert_eq!(storage.create_account_calls(), 3);
        assert_eq!(storage.account_count(), 3);
        assert!(storage.transactions_written_before_blocks().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_endpoints_resolve_to_their_addresses() {
        let chain = InMemoryChain::with_empty_blocks(1);
        let deployer = Address::repeat_byte(0xde);
        let contract = Address::repeat_byte(0xc0);
        let user = Address::repeat_byte(0x05);
        let deploy = chain.insert_transaction(2, deployer, None, Some(contract));
        let call = chain.insert_transaction(2, user, Some(contract), None);
        let storage = Arc::new(InMemoryStorage::default());
        let scanner = scanner(chain, Arc::clone(&storage)).await;

        scanner.run_sync(SyncTarget::Blocks(2)).await.unwrap();

        let id_of = |address| storage.get_account(address).unwrap().unwrap().id;
        let deploy = storage.get_transaction(deploy).unwrap().unwrap();
        assert_eq!((deploy.from_id, deploy.to_id), (id_of(deployer), id_of(contract)));
        let call = storage.get_transaction(call).unwrap().unwrap();
        assert_eq!((call.from_id, call.to_id), (id_of(user), id_of(contract)));
        assert!(storage.get_account(contract).unwrap().unwrap().is_contract);
    }

    #[tokio::test]
    async fn test_rerunning_range_is_idempotent() {
        let chain = InMemoryChain::with_empty_blocks(5);
        chain.insert_transaction(3, Address::repeat_byte(1), Some(Address::repeat_byte(2)), None);
        let chain = Arc::new(chain);

        let storage = Arc::new(InMemoryStorage::default());
        let mut first = Scanner::new(Arc::clone(&chain), Arc::clone(&storage), config());
        first.init().await.unwrap();
        first.run_sync(SyncTarget::Blocks(5)).await.unwrap();

        // Rewind the watermark so the same range is synced again.
        storage.update_settings(Settings::new(0)).unwrap();
        let mut second = Scanner::new(Arc::clone(&chain), Arc::clone(&storage), config());
        second.init().await.unwrap();
        let report = second.run_sync(SyncTarget::Blocks(5)).await.unwrap();

        assert_eq!(report.blocks, 5);
        assert_eq!(storage.blocks().len(), 5);
        assert_eq!(storage.transaction_count(), 1);
        assert_eq!(storage.account_count(), 2);
        assert_eq!(storage.latest_synced_block().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_watermark_is_monotonic_across_runs() {
        let chain = InMemoryChain::with_empty_blocks(10);
        let storage = Arc::new(InMemoryStorage::default());
        let scanner = scanner(chain, Arc::clone(&storage)).await;

        let mut last = scanner.latest_synced_block();
        for count in [3, 0, 4, 10] {
            let report = scanner.run_sync(SyncTarget::Blocks(count)).await.unwrap();
            assert!(report.latest_synced_block >= last);
            last = report.latest_synced_block;
        }

        assert_eq!(last, 10);
        assert_eq!(storage.latest_synced_block().unwrap(), 10);
        assert_eq!(storage.blocks().len(), 10);
    }

    #[tokio::test]
    async fn test_range_clamped_to_tip() {
        let chain = InMemoryChain::with_empty_blocks(3);
        let storage = Arc::new(InMemoryStorage::default());
        let scanner = scanner(chain, Arc::clone(&storage)).await;

        let report = scanner.run_sync(SyncTarget::Blocks(100)).await.unwrap();

        assert_eq!((report.from, report.to), (1, 3));
        assert_eq!(report.blocks, 3);
        assert_eq!(storage.latest_synced_block().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_block_retried_until_returned() {
        let block = Block { number: 8, timestamp: 1_700_000_000, transactions: vec![] };
        let calls = Arc::new(AtomicUsize::new(0));
        let mut provider = MockChainProvider::new();

        provider.expect_block_number().returning(|| Ok(8));
        let counter = Arc::clone(&calls);
        provider.expect_block().withf(|number| *number == 8).times(3).returning(move |_| {
            // The node has not caught up for the first two calls.
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(None)
            } else {
                Ok(Some(block.clone()))
            }
        });

        let storage = Arc::new(InMemoryStorage::with_watermark(7));
        let scanner = scanner(provider, Arc::clone(&storage)).await;

        let report = scanner.run_sync(SyncTarget::Blocks(1)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.blocks, 1);
        assert_eq!(storage.blocks().len(), 1);
        assert_eq!(storage.get_block(8).unwrap().unwrap().timestamp, 1_700_000_000);
        assert_eq!(storage.latest_synced_block().unwrap(), 8);
    }

    #[tokio::test]
    async fn test_persist_failure_reported() {
        let chain = InMemoryChain::with_empty_blocks(1);
        let doomed = chain.insert_transaction(
            1,
            Address::repeat_byte(1),
            Some(Address::repeat_byte(2)),
            None,
        );
        let storage = Arc::new(InMemoryStorage::default());
        storage.reject_transaction(doomed);
        let scanner = scanner(chain, Arc::clone(&storage)).await;

        let report = scanner.run_sync(SyncTarget::Blocks(1)).await.unwrap();

        assert_eq!(report.blocks, 1);
        assert_eq!(report.transactions, 0);
        assert_eq!(report.failed_transactions, 1);
        assert_eq!(storage.latest_synced_block().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_account_failure_is_retried() {
        let chain = InMemoryChain::with_empty_blocks(1);
        let (from, to) = (Address::repeat_byte(1), Address::repeat_byte(2));
        let hash = chain.insert_transaction(1, from, Some(to), None);
        let storage = Arc::new(InMemoryStorage::default());
        storage.fail_account_creations(2);
        let scanner = scanner(chain, Arc::clone(&storage)).await;

        let report = scanner.run_sync(SyncTarget::Blocks(1)).await.unwrap();

        assert_eq!(report.failed_transactions, 0);
        assert!(storage.get_transaction(hash).unwrap().is_some());
        assert_eq!(storage.account_count(), 2);
    }

    #[tokio::test]
    async fn test_live_mode_follows_new_blocks() {
        let chain = Arc::new(InMemoryChain::with_empty_blocks(2));
        let storage = Arc::new(InMemoryStorage::default());
        let mut scanner = Scanner::new(Arc::clone(&chain), Arc::clone(&storage), config());
        scanner.init().await.unwrap();

        let live = tokio::spawn(async move { scanner.run_sync(SyncTarget::Live).await });

        let wait_for = |n: usize| {
            let storage = Arc::clone(&storage);
            async move {
                while storage.blocks().len() < n {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        };

        tokio::time::timeout(Duration::from_secs(10), wait_for(2)).await.unwrap();
        chain.insert_block(3);
        chain.insert_block(4);
        tokio::time::timeout(Duration::from_secs(10), wait_for(4)).await.unwrap();

        assert!(!live.is_finished());
        live.abort();
    }

    #[tokio::test]
    async fn test_balance_returns_none_on_error() {
        let address = Address::repeat_byte(0x42);
        let mut provider = MockChainProvider::new();
        provider.expect_block_number().returning(|| Ok(0));
        provider.expect_balance().times(1).returning(|_| {
            Err(RpcError::Timeout { method: "eth_getBalance", timeout: Duration::ZERO })
        });
        let scanner = scanner(provider, Arc::new(InMemoryStorage::default())).await;

        assert_eq!(scanner.balance(address).await, None);
    }

    #[tokio::test]
    async fn test_balance_passthrough() {
        let chain = InMemoryChain::default();
        let address = Address::repeat_byte(0x42);
        chain.set_balance(address, U256::from(1_000_000u64));
        let scanner = scanner(chain, Arc::new(InMemoryStorage::default())).await;

        assert_eq!(scanner.balance(address).await, Some(U256::from(1_000_000u64)));
        assert_eq!(scanner.balance(Address::ZERO).await, Some(U256::ZERO));
    }
}
