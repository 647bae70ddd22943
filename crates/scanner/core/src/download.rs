//! The fetch stage of the pipeline.
//!
//! The [`DownloadQueue`] holds block numbers and transaction hashes waiting to be fetched. A
//! dispatcher task hands them to fetch tasks, bounded by a semaphore, and forwards every result to
//! the [`SyncQueue`]. Failed fetches go back to the end of the queue.

use crate::{ScannerConfig, SyncQueue, metrics::Metrics};
use alloy_primitives::TxHash;
use chainscan_rpc::{ChainProvider, RpcError};
use chainscan_storage::ScanStorage;
use chainscan_types::{BlockFetch, Envelope, Receipt, Transaction, TransactionFetch};
use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};
use thiserror::Error;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace, warn};

/// A single unit of fetch work.
#[derive(Debug)]
enum Job {
    Block(BlockFetch),
    Transaction(TransactionFetch),
}

/// Why a fetch has to be retried.
#[derive(Debug, Error)]
enum FetchFailure {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("{0} not returned by node")]
    Missing(&'static str),
}

/// Why the dispatcher did not spawn a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pause {
    /// Nothing to fetch.
    Idle,
    /// The sync queue is too far behind.
    Throttle,
}

#[derive(Debug, Default)]
struct DownloadState {
    blocks: VecDeque<BlockFetch>,
    transactions: VecDeque<TransactionFetch>,
    /// Block numbers queued or in flight.
    pending_blocks: HashSet<u64>,
    /// Transaction hashes queued or in flight.
    pending_transactions: HashSet<TxHash>,
    in_flight: usize,
    dispatching: bool,
}

impl DownloadState {
    fn is_idle(&self) -> bool {
        self.blocks.is_empty() && self.transactions.is_empty() && self.in_flight == 0
    }

    /// Pops the next job, blocks first.
    fn next_job(&mut self) -> Option<Job> {
        let job = self
            .blocks
            .pop_front()
            .map(Job::Block)
            .or_else(|| self.transactions.pop_front().map(Job::Transaction))?;
        self.in_flight += 1;
        Some(job)
    }
}

#[derive(Debug)]
struct DownloadInner<P, S> {
    provider: Arc<P>,
    sync: SyncQueue<S>,
    max_sync_backlog: usize,
    idle_interval: Duration,
    throttle_interval: Duration,
    permits: Arc<Semaphore>,
    state: Mutex<DownloadState>,
    /// Signalled when new work is queued.
    wakeup: Notify,
    /// Signalled when the queue becomes idle.
    idle: Notify,
}

/// Deduplicating queue of block numbers and transaction hashes to fetch.
///
/// The dispatcher is spawned on the first enqueue and runs until the last handle is dropped.
#[derive(Debug)]
pub struct DownloadQueue<P, S> {
    inner: Arc<DownloadInner<P, S>>,
}

impl<P, S> Clone for DownloadQueue<P, S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<P, S> DownloadQueue<P, S>
where
    P: ChainProvider + 'static,
    S: ScanStorage + 'static,
{
    /// Creates a queue fetching from `provider` and forwarding to `sync`.
    pub fn new(provider: Arc<P>, sync: SyncQueue<S>, config: &ScannerConfig) -> Self {
        Self {
            inner: Arc::new(DownloadInner {
                provider,
                sync,
                max_sync_backlog: config.max_sync_backlog,
                idle_interval: config.idle_interval,
                throttle_interval: config.throttle_interval,
                permits: Arc::new(Semaphore::new(config.max_fetch_concurrency.max(1))),
                state: Mutex::new(DownloadState::default()),
                wakeup: Notify::new(),
                idle: Notify::new(),
            }),
        }
    }

    /// Queues block `number` unless it is already queued or in flight.
    pub fn add_block(&self, number: u64) {
        let spawn = {
            let mut state = self.inner.lock();
            if !state.pending_blocks.insert(number) {
                trace!(target: "download_queue", block_number = number, "Block already pending");
                return;
            }
            state.blocks.push_back(Envelope::new(number));
            !std::mem::replace(&mut state.dispatching, true)
        };
        self.inner.sync.expect_block(number);
        self.wake(spawn);
    }

    /// Queues transaction `hash` unless it is already queued or in flight.
    pub fn add_transaction(&self, hash: TxHash) {
        let spawn = {
            let mut state = self.inner.lock();
            if !state.pending_transactions.insert(hash) {
                trace!(target: "download_queue", %hash, "Transaction already pending");
                return;
            }
            state.transactions.push_back(Envelope::new(hash));
            !std::mem::replace(&mut state.dispatching, true)
        };
        self.wake(spawn);
    }

    fn wake(&self, spawn: bool) {
        if spawn {
            debug!(target: "download_queue", "Starting fetch dispatcher");
            tokio::spawn(DownloadInner::dispatch(Arc::downgrade(&self.inner)));
        } else {
            self.inner.wakeup.notify_one();
        }
    }

    /// Returns the number of queued items, excluding fetches in flight.
    pub fn len(&self) -> usize {
        let state = self.inner.lock();
        state.blocks.len() + state.transactions.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of queued block numbers.
    pub fn blocks_len(&self) -> usize {
        self.inner.lock().blocks.len()
    }

    /// Returns the number of queued transaction hashes.
    pub fn transactions_len(&self) -> usize {
        self.inner.lock().transactions.len()
    }

    /// Returns the number of fetches in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }

    /// Returns true if nothing is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.inner.lock().is_idle()
    }

    /// Waits until nothing is queued or in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl<P, S> DownloadInner<P, S> {
    fn lock(&self) -> MutexGuard<'_, DownloadState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<P, S> DownloadInner<P, S>
where
    P: ChainProvider + 'static,
    S: ScanStorage + 'static,
{
    /// Hands queued work to fetch tasks until the queue is dropped.
    async fn dispatch(this: Weak<Self>) {
        while let Some(inner) = this.upgrade() {
            match inner.dispatch_next().await {
                Some(Pause::Idle) => {
                    tokio::select! {
                        _ = tokio::time::sleep(inner.idle_interval) => {}
                        _ = inner.wakeup.notified() => {}
                    }
                }
                Some(Pause::Throttle) => tokio::time::sleep(inner.throttle_interval).await,
                None => {}
            }
        }
        debug!(target: "download_queue", "Fetch dispatcher stopped");
    }

    /// Spawns the next fetch. Returns why it paused if nothing was spawned.
    async fn dispatch_next(self: &Arc<Self>) -> Option<Pause> {
        let backlog = self.sync.backlog();
        if backlog > self.max_sync_backlog {
            trace!(target: "download_queue", backlog, "Sync backlog full, throttling fetches");
            return Some(Pause::Throttle);
        }

        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            return Some(Pause::Idle);
        };

        let Some(job) = self.lock().next_job() else {
            return Some(Pause::Idle);
        };

        tokio::spawn(Arc::clone(self).fetch(job, permit));
        None
    }

    async fn fetch(self: Arc<Self>, job: Job, permit: OwnedSemaphorePermit) {
        match job {
            Job::Block(entry) => self.fetch_block(entry).await,
            Job::Transaction(entry) => self.fetch_transaction(entry).await,
        }
        drop(permit);
    }

    async fn fetch_block(&self, entry: BlockFetch) {
        let number = entry.item;
        let block = match self.provider.block(number).await {
            Ok(Some(block)) => block,
            Ok(None) => return self.retry_block(entry, FetchFailure::Missing("block")),
            Err(err) => return self.retry_block(entry, err.into()),
        };

        trace!(
            target: "download_queue",
            block_number = number,
            transactions = block.transaction_count(),
            "Fetched block"
        );

        // The block reaches the sync queue before any of its transactions can.
        let hashes = block.transactions.clone();
        self.sync.add_block(block);

        let mut state = self.lock();
        let mut queued = false;
        for hash in hashes {
            if state.pending_transactions.insert(hash) {
                state.transactions.push_back(Envelope::new(hash));
                queued = true;
            }
        }
        state.pending_blocks.remove(&number);
        self.finish(state, queued);
    }

    async fn fetch_transaction(&self, entry: TransactionFetch) {
        let hash = entry.item;
        let (transaction, receipt) = match self.fetch_transaction_parts(hash).await {
            Ok(parts) => parts,
            Err(failure) => return self.retry_transaction(entry, failure),
        };

        trace!(target: "download_queue", %hash, "Fetched transaction");
        self.sync.add_transaction(transaction, receipt);

        let mut state = self.lock();
        state.pending_transactions.remove(&hash);
        self.finish(state, false);
    }

    async fn fetch_transaction_parts(
        &self,
        hash: TxHash,
    ) -> Result<(Transaction, Receipt), FetchFailure> {
        let transaction =
            self.provider.transaction(hash).await?.ok_or(FetchFailure::Missing("transaction"))?;
        let receipt = self.provider.receipt(hash).await?.ok_or(FetchFailure::Missing("receipt"))?;
        Ok((transaction, receipt))
    }

    fn retry_block(&self, entry: BlockFetch, failure: FetchFailure) {
        let entry = entry.retry();
        warn!(
            target: "download_queue",
            block_number = entry.item,
            retries = entry.retries,
            %failure,
            "Failed to fetch block, re-queueing"
        );
        Metrics::record_fetch_retry(Metrics::BLOCK);

        let mut state = self.lock();
        state.blocks.push_back(entry);
        self.finish(state, false);
    }

    fn retry_transaction(&self, entry: TransactionFetch, failure: FetchFailure) {
        let entry = entry.retry();
        warn!(
            target: "download_queue",
            hash = %entry.item,
            retries = entry.retries,
            %failure,
            "Failed to fetch transaction, re-queueing"
        );
        Metrics::record_fetch_retry(Metrics::TRANSACTION);

        let mut state = self.lock();
        state.transactions.push_back(entry);
        self.finish(state, false);
    }

    /// Completes a fetch, waking idle waiters and, if new work was queued, the dispatcher.
    ///
    /// Retried items do not wake the dispatcher, so an item that keeps failing is attempted at
    /// most once per idle interval while nothing else is queued.
    fn finish(&self, mut state: MutexGuard<'_, DownloadState>, queued: bool) {
        state.in_flight -= 1;
        let idle = state.is_idle();
        drop(state);

        if queued {
            self.wakeup.notify_one();
        }
        if idle {
            self.idle.notify_waiters();
        }
    }
}
