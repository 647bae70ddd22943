//! The persistence stage of the pipeline.
//!
//! The [`SyncQueue`] buffers fetched blocks and transactions, resolves transaction endpoints to
//! account ids and writes both in batches. Its coordinating loop starts on the first enqueue and
//! stops once everything is written, persisting the watermark on the way out.
//!
//! The watermark only covers a gap-free prefix of blocks: a block counts once it is written and
//! every one of its transactions is written or dropped, and every block number registered with
//! [`SyncQueue::expect_block`] holds the watermark back until it does.

use crate::{AccountCache, ScannerConfig, ScannerError, blocking::run_blocking, metrics::Metrics};
use alloy_primitives::{Address, TxHash};
use chainscan_storage::ScanStorage;
use chainscan_types::{
    Block, BlockPersist, BlockRow, Envelope, NewAccount, PendingTransaction, Receipt, Settings,
    Transaction, TransactionPersist, TransactionRow,
};
use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, trace, warn};

/// Cumulative persistence counters of a [`SyncQueue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    /// Blocks written.
    pub blocks: u64,
    /// Transactions written.
    pub transactions: u64,
    /// Blocks dropped after exhausting their retries.
    pub failed_blocks: u64,
    /// Transactions dropped after exhausting their retries.
    pub failed_transactions: u64,
}

impl SyncTotals {
    /// Returns the counts accumulated since `earlier`.
    pub const fn since(&self, earlier: &Self) -> Self {
        Self {
            blocks: self.blocks - earlier.blocks,
            transactions: self.transactions - earlier.transactions,
            failed_blocks: self.failed_blocks - earlier.failed_blocks,
            failed_transactions: self.failed_transactions - earlier.failed_transactions,
        }
    }
}

/// Counters of one run of the coordinating loop.
#[derive(Debug, Clone, Copy)]
struct Session {
    started: Instant,
    totals: SyncTotals,
}

impl Session {
    fn new() -> Self {
        Self { started: Instant::now(), totals: SyncTotals::default() }
    }

    fn rates(&self) -> (f64, f64) {
        let secs = self.started.elapsed().as_secs_f64().max(f64::EPSILON);
        (self.totals.blocks as f64 / secs, self.totals.transactions as f64 / secs)
    }
}

/// Persistence progress of one block and its transactions.
#[derive(Debug, Clone, Copy, Default)]
struct BlockProgress {
    stored: bool,
    /// Transactions neither written nor dropped yet, once the block body has arrived.
    remaining: Option<usize>,
    /// The block or one of its transactions was dropped.
    dropped: bool,
}

impl BlockProgress {
    const fn is_complete(&self) -> bool {
        self.stored && matches!(self.remaining, Some(0))
    }
}

#[derive(Debug)]
struct SyncState {
    blocks: VecDeque<BlockPersist>,
    transactions: VecDeque<TransactionPersist>,
    /// Numbers of blocks buffered or being written.
    uncommitted: HashSet<u64>,
    /// Hashes of transactions buffered or being written.
    buffered_transactions: HashSet<TxHash>,
    cache: AccountCache,
    /// Blocks above the watermark that are expected, buffered or being written.
    progress: BTreeMap<u64, BlockProgress>,
    latest_block: u64,
    writes_in_flight: usize,
    running: bool,
    session: Session,
    totals: SyncTotals,
}

impl SyncState {
    fn is_drained(&self) -> bool {
        self.blocks.is_empty() && self.transactions.is_empty() && self.writes_in_flight == 0
    }

    /// Marks the loop as running. Returns true if it has to be spawned.
    fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.session = Session::new();
        true
    }

    fn record(&mut self, f: impl Fn(&mut SyncTotals)) {
        f(&mut self.session.totals);
        f(&mut self.totals);
    }

    fn block_settled(&mut self, number: u64, dropped: bool) {
        if let Some(progress) = self.progress.get_mut(&number) {
            progress.stored = true;
            progress.dropped |= dropped;
        }
    }

    fn transaction_settled(&mut self, block_number: u64, dropped: bool) {
        if let Some(progress) = self.progress.get_mut(&block_number) {
            progress.remaining = progress.remaining.map(|remaining| remaining.saturating_sub(1));
            progress.dropped |= dropped;
        }
    }

    /// Raises the watermark over the leading run of complete blocks.
    fn advance_watermark(&mut self) {
        while let Some(entry) = self.progress.first_entry() {
            if !entry.get().is_complete() {
                break;
            }
            let (number, progress) = entry.remove_entry();

            if progress.dropped {
                warn!(
                    target: "sync_queue",
                    block_number = number,
                    "Watermark passes a block with dropped items"
                );
            }
            if number > self.latest_block {
                self.latest_block = number;
                Metrics::record_latest_block(number);
            }
        }
    }
}

#[derive(Debug)]
struct SyncInner<S> {
    storage: Arc<S>,
    batch_size: usize,
    max_persist_retries: u32,
    sync_interval: Duration,
    permits: Arc<Semaphore>,
    state: Mutex<SyncState>,
    idle: Notify,
}

/// Buffers fetched data and writes it to storage in batches.
///
/// Cloning returns another handle to the same queue.
#[derive(Debug)]
pub struct SyncQueue<S> {
    inner: Arc<SyncInner<S>>,
}

impl<S> Clone for SyncQueue<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S> SyncQueue<S>
where
    S: ScanStorage + 'static,
{
    /// Creates an idle queue writing to `storage`.
    pub fn new(storage: Arc<S>, config: &ScannerConfig) -> Self {
        let state = SyncState {
            blocks: VecDeque::new(),
            transactions: VecDeque::new(),
            uncommitted: HashSet::new(),
            buffered_transactions: HashSet::new(),
            cache: AccountCache::new(),
            progress: BTreeMap::new(),
            latest_block: 0,
            writes_in_flight: 0,
            running: false,
            session: Session::new(),
            totals: SyncTotals::default(),
        };

        Self {
            inner: Arc::new(SyncInner {
                storage,
                batch_size: config.batch_size.max(1),
                max_persist_retries: config.max_persist_retries,
                sync_interval: config.sync_interval,
                permits: Arc::new(Semaphore::new(config.max_storage_concurrency.max(1))),
                state: Mutex::new(state),
                idle: Notify::new(),
            }),
        }
    }

    /// Registers a block that is still being fetched.
    ///
    /// The watermark does not pass `number` until the block and all of its transactions have
    /// been written or dropped.
    pub fn expect_block(&self, number: u64) {
        self.inner.lock().progress.entry(number).or_default();
    }

    /// Buffers a fetched block. A block already buffered or being written is ignored.
    pub fn add_block(&self, block: Block) {
        let spawn = {
            let mut state = self.inner.lock();
            if !state.uncommitted.insert(block.number) {
                trace!(target: "sync_queue", block_number = block.number, "Block already buffered");
                return;
            }
            let progress = state.progress.entry(block.number).or_default();
            progress.stored = false;
            progress.remaining = Some(block.transaction_count());
            state.blocks.push_back(Envelope::new(block));
            state.start()
        };

        if spawn {
            self.spawn_loop();
        }
    }

    /// Buffers a fetched transaction with its receipt. A hash already buffered is ignored.
    pub fn add_transaction(&self, transaction: Transaction, receipt: Receipt) {
        let spawn = {
            let mut state = self.inner.lock();
            if !state.buffered_transactions.insert(transaction.hash) {
                trace!(
                    target: "sync_queue",
                    hash = %transaction.hash,
                    "Transaction already buffered"
                );
                return;
            }
            let pending = PendingTransaction::new(transaction, receipt);
            state.transactions.push_back(Envelope::new(pending));
            state.start()
        };

        if spawn {
            self.spawn_loop();
        }
    }

    fn spawn_loop(&self) {
        debug!(target: "sync_queue", "Starting sync loop");
        tokio::spawn(Arc::clone(&self.inner).run());
    }

    /// Returns the number of buffered items, excluding batches being written.
    pub fn backlog(&self) -> usize {
        let state = self.inner.lock();
        state.blocks.len() + state.transactions.len()
    }

    /// Returns the highest block number covered by a successful block batch.
    pub fn latest_block(&self) -> u64 {
        self.inner.lock().latest_block
    }

    /// Raises the in-memory watermark to `number`. Lower values are ignored.
    pub fn advance_latest_block(&self, number: u64) {
        let mut state = self.inner.lock();
        state.latest_block = state.latest_block.max(number);
    }

    /// Returns the counters accumulated since the queue was created.
    pub fn totals(&self) -> SyncTotals {
        self.inner.lock().totals
    }

    /// Returns the number of cached accounts.
    pub fn cached_accounts(&self) -> usize {
        self.inner.lock().cache.len()
    }

    /// Returns true if the coordinating loop is stopped.
    pub fn is_idle(&self) -> bool {
        !self.inner.lock().running
    }

    /// Waits until the coordinating loop has drained and stopped.
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

impl<S> SyncInner<S> {
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S> SyncInner<S>
where
    S: ScanStorage + 'static,
{
    async fn run(self: Arc<Self>) {
        loop {
            self.dispatch_blocks();
            self.dispatch_transactions().await;

            {
                let state = self.lock();
                let (blocks_per_sec, transactions_per_sec) = state.session.rates();
                debug!(
                    target: "sync_queue",
                    blocks = state.blocks.len(),
                    transactions = state.transactions.len(),
                    writes_in_flight = state.writes_in_flight,
                    blocks_per_sec,
                    transactions_per_sec,
                    "Sync iteration"
                );
            }

            if self.try_finish().await {
                return;
            }
            tokio::time::sleep(self.sync_interval).await;
        }
    }

    /// Takes a block batch and spawns its write if a storage permit is available.
    fn dispatch_blocks(self: &Arc<Self>) {
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            return;
        };

        let batch = {
            let mut state = self.lock();
            let batch = take_batch(&mut state.blocks, self.batch_size, |_| true);
            if !batch.is_empty() {
                state.writes_in_flight += 1;
            }
            batch
        };

        if !batch.is_empty() {
            tokio::spawn(Arc::clone(self).write_blocks(batch, permit));
        }
    }

    async fn write_blocks(
        self: Arc<Self>,
        batch: Vec<BlockPersist>,
        permit: OwnedSemaphorePermit,
    ) {
        let rows: Vec<BlockRow> = batch.iter().map(|entry| entry.item.to_row()).collect();
        let first = rows.first().map(|row| row.number).unwrap_or_default();
        let last = rows.last().map(|row| row.number).unwrap_or_default();

        let started = Instant::now();
        let result =
            run_blocking(&self.storage, move |storage| storage.bulk_create_blocks(&rows)).await;
        Metrics::record_batch(
            Metrics::BLOCK,
            batch.len(),
            started.elapsed().as_secs_f64(),
            &result,
        );
        drop(permit);

        let mut state = self.lock();
        state.writes_in_flight -= 1;

        match result {
            Ok(inserted) => {
                for entry in &batch {
                    state.uncommitted.remove(&entry.item.number);
                    state.block_settled(entry.item.number, false);
                }
                state.advance_watermark();
                let written = batch.len() as u64;
                state.record(|totals| totals.blocks += written);
                debug!(
                    target: "sync_queue",
                    batch_size = batch.len(),
                    inserted,
                    first,
                    last,
                    "Wrote block batch"
                );
            }
            Err(err) => {
                error!(
                    target: "sync_queue",
                    batch_size = batch.len(),
                    first,
                    last,
                    %err,
                    "Failed to write block batch"
                );
                for entry in batch {
                    self.retry_block(&mut state, entry);
                }
            }
        }
    }

    fn retry_block(&self, state: &mut SyncState, entry: BlockPersist) {
        let entry = entry.retry();
        let number = entry.item.number;

        if entry.retries > self.max_persist_retries {
            error!(
                target: "sync_queue",
                block_number = number,
                retries = entry.retries,
                "Dropping block after exhausting persist retries"
            );
            state.uncommitted.remove(&number);
            state.block_settled(number, true);
            state.advance_watermark();
            state.record(|totals| totals.failed_blocks += 1);
            Metrics::record_dropped(Metrics::BLOCK);
        } else {
            state.blocks.push_back(entry);
        }
    }

    /// Takes a transaction batch, resolves its accounts and spawns its write.
    ///
    /// A transaction is only taken once its block is neither buffered nor being written.
    async fn dispatch_transactions(self: &Arc<Self>) {
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            return;
        };

        let batch = {
            let mut state = self.lock();
            let SyncState { transactions, uncommitted, .. } = &mut *state;
            take_batch(transactions, self.batch_size, |entry| {
                !uncommitted.contains(&entry.item.block_number())
            })
        };
        if batch.is_empty() {
            return;
        }

        let mut resolved = Vec::with_capacity(batch.len());
        for mut entry in batch {
            match self.resolve_accounts(&mut entry.item).await {
                Ok(()) => resolved.push(entry),
                Err(err) => {
                    warn!(
                        target: "sync_queue",
                        hash = %entry.item.hash(),
                        %err,
                        "Failed to resolve transaction accounts"
                    );
                    let mut state = self.lock();
                    self.retry_transaction(&mut state, entry);
                }
            }
        }

        if resolved.is_empty() {
            return;
        }
        self.lock().writes_in_flight += 1;
        tokio::spawn(Arc::clone(self).write_transactions(resolved, permit));
    }

    /// Fills in the sender and recipient account ids that are still unresolved.
    async fn resolve_accounts(
        &self,
        pending: &mut PendingTransaction,
    ) -> Result<(), ScannerError> {
        if pending.from.is_none() {
            let from = pending.transaction.from;
            pending.from = Some(self.resolve_account(NewAccount::external(from)).await?);
        }

        if pending.to.is_none() {
            let account = match pending.transaction.recipient(&pending.receipt) {
                Some(address) if pending.transaction.is_contract_creation() => {
                    NewAccount::contract(address)
                }
                Some(address) => NewAccount::external(address),
                None => {
                    warn!(
                        target: "sync_queue",
                        hash = %pending.hash(),
                        "Transaction has no recipient, using the zero address"
                    );
                    NewAccount::external(Address::ZERO)
                }
            };
            pending.to = Some(self.resolve_account(account).await?);
        }

        Ok(())
    }

    /// Returns the id of the account, creating it in storage on a cache miss.
    async fn resolve_account(&self, account: NewAccount) -> Result<u64, ScannerError> {
        let cached = self.lock().cache.get(&account.address);
        if let Some(id) = cached {
            return Ok(id);
        }

        let (stored, created) =
            run_blocking(&self.storage, move |storage| storage.create_account(account)).await?;
        trace!(
            target: "sync_queue",
            address = %stored.address,
            id = stored.id,
            created,
            "Resolved account"
        );

        self.lock().cache.set(stored.address, stored.id);
        Ok(stored.id)
    }

    async fn write_transactions(
        self: Arc<Self>,
        batch: Vec<TransactionPersist>,
        permit: OwnedSemaphorePermit,
    ) {
        let rows: Vec<TransactionRow> =
            batch.iter().filter_map(|entry| to_row(&entry.item)).collect();
        let first = batch.first().map(|entry| entry.item.hash()).unwrap_or_default();

        let started = Instant::now();
        let result =
            run_blocking(&self.storage, move |storage| storage.bulk_create_transactions(&rows))
                .await;
        Metrics::record_batch(
            Metrics::TRANSACTION,
            batch.len(),
            started.elapsed().as_secs_f64(),
            &result,
        );
        drop(permit);

        let mut state = self.lock();
        state.writes_in_flight -= 1;

        match result {
            Ok(inserted) => {
                for entry in &batch {
                    state.buffered_transactions.remove(&entry.item.hash());
                    state.transaction_settled(entry.item.block_number(), false);
                }
                state.advance_watermark();
                let written = batch.len() as u64;
                state.record(|totals| totals.transactions += written);
                debug!(
                    target: "sync_queue",
                    batch_size = batch.len(),
                    inserted,
                    %first,
                    "Wrote transaction batch"
                );
            }
            Err(err) => {
                error!(
                    target: "sync_queue",
                    batch_size = batch.len(),
                    %first,
                    %err,
                    "Failed to write transaction batch"
                );
                for entry in batch {
                    self.retry_transaction(&mut state, entry);
                }
            }
        }
    }

    fn retry_transaction(&self, state: &mut SyncState, entry: TransactionPersist) {
        let entry = entry.retry();
        let hash = entry.item.hash();

        if entry.retries > self.max_persist_retries {
            error!(
                target: "sync_queue",
                %hash,
                block_number = entry.item.block_number(),
                retries = entry.retries,
                "Dropping transaction after exhausting persist retries"
            );
            state.buffered_transactions.remove(&hash);
            state.transaction_settled(entry.item.block_number(), true);
            state.advance_watermark();
            state.record(|totals| totals.failed_transactions += 1);
            Metrics::record_dropped(Metrics::TRANSACTION);
        } else {
            state.transactions.push_back(entry);
        }
    }

    /// Persists the watermark and stops the loop once nothing is left to write.
    ///
    /// Returns true if the loop stopped.
    async fn try_finish(&self) -> bool {
        let latest_block = {
            let state = self.lock();
            if !state.is_drained() {
                return false;
            }
            state.latest_block
        };

        let settings = Settings::new(latest_block);
        if let Err(err) =
            run_blocking(&self.storage, move |storage| storage.update_settings(settings)).await
        {
            error!(target: "sync_queue", latest_block, %err, "Failed to persist watermark");
            return false;
        }

        let mut state = self.lock();
        if !state.is_drained() {
            // Work arrived while the watermark was written.
            return false;
        }
        state.running = false;

        let (blocks_per_sec, transactions_per_sec) = state.session.rates();
        info!(
            target: "sync_queue",
            blocks = state.session.totals.blocks,
            transactions = state.session.totals.transactions,
            failed_blocks = state.session.totals.failed_blocks,
            failed_transactions = state.session.totals.failed_transactions,
            elapsed = ?state.session.started.elapsed(),
            blocks_per_sec,
            transactions_per_sec,
            cached_accounts = state.cache.len(),
            latest_block,
            "Sync queue drained"
        );
        drop(state);

        self.idle.notify_waiters();
        true
    }
}

/// Pops the next batch of eligible entries, keeping the order of everything left behind.
///
/// Entries that already failed once are written alone so they cannot fail a whole batch again.
fn take_batch<T>(
    queue: &mut VecDeque<Envelope<T>>,
    limit: usize,
    eligible: impl Fn(&Envelope<T>) -> bool,
) -> Vec<Envelope<T>> {
    let mut batch = Vec::new();
    let mut skipped = VecDeque::new();

    while batch.len() < limit {
        let Some(entry) = queue.pop_front() else {
            break;
        };
        if !eligible(&entry) {
            skipped.push_back(entry);
            continue;
        }
        if entry.retries > 0 {
            if batch.is_empty() {
                batch.push(entry);
                break;
            }
            skipped.push_back(entry);
            continue;
        }
        batch.push(entry);
    }

    skipped.append(queue);
    *queue = skipped;
    batch
}

fn to_row(pending: &PendingTransaction) -> Option<TransactionRow> {
    Some(TransactionRow {
        hash: pending.hash(),
        from_id: pending.from?,
        to_id: pending.to?,
        block_number: pending.block_number(),
        value: pending.transaction.value,
        gas_limit: pending.transaction.gas_limit,
        gas_used: pending.receipt.gas_used,
        status: pending.receipt.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::InMemoryStorage;
    use alloy_primitives::{B256, U256};
    use chainscan_storage::{AccountStorage, BlockStorage, SettingsStorage, TransactionStorage};

    fn config() -> ScannerConfig {
        ScannerConfig {
            batch_size: 10,
            sync_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn block(number: u64) -> Block {
        Block { number, timestamp: 1_000 + number, transactions: vec![] }
    }

    fn transaction(hash: u8, block_number: u64, from: Address, to: Option<Address>) -> Transaction {
        Transaction {
            hash: B256::repeat_byte(hash),
            from,
            to,
            block_number,
            value: U256::from(hash),
            gas_limit: 21_000,
        }
    }

    fn receipt() -> Receipt {
        Receipt { contract_address: None, gas_used: 21_000, status: true }
    }

    #[test]
    fn test_take_batch_isolates_retried_entries() {
        let mut queue: VecDeque<Envelope<u64>> =
            VecDeque::from([Envelope::new(1), Envelope::new(2).retry(), Envelope::new(3)]);

        let batch = take_batch(&mut queue, 10, |_| true);
        assert_eq!(batch.iter().map(|e| e.item).collect::<Vec<_>>(), vec![1, 3]);

        let batch = take_batch(&mut queue, 10, |_| true);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].item, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_batch_defers_ineligible_in_order() {
        let mut queue: VecDeque<Envelope<u64>> = (1..=5).map(Envelope::new).collect();

        let batch = take_batch(&mut queue, 2, |e| e.item % 2 == 0);
        assert_eq!(batch.iter().map(|e| e.item).collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(queue.iter().map(|e| e.item).collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_drain_persists_blocks_and_watermark() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());
        queue.advance_latest_block(100);

        queue.add_block(block(102));
        queue.add_block(block(101));
        queue.add_block(block(101));
        assert!(!queue.is_idle());

        queue.wait_idle().await;

        assert_eq!(queue.latest_block(), 102);
        assert_eq!(storage.latest_synced_block().unwrap(), 102);
        assert!(storage.get_block(101).unwrap().is_some());
        assert!(storage.get_block(102).unwrap().is_some());
        assert_eq!(queue.totals().blocks, 2);
        assert_eq!(queue.backlog(), 0);
    }

    #[tokio::test]
    async fn test_watermark_never_regresses() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());
        queue.advance_latest_block(500);
        queue.advance_latest_block(200);

        queue.add_block(block(300));
        queue.wait_idle().await;

        assert_eq!(queue.latest_block(), 500);
        assert_eq!(storage.latest_synced_block().unwrap(), 500);
    }

    #[tokio::test]
    async fn test_accounts_resolved_once_per_address() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);

        queue.add_block(block(7));
        queue.add_transaction(transaction(1, 7, alice, Some(bob)), receipt());
        queue.add_transaction(transaction(2, 7, bob, Some(alice)), receipt());
        queue.add_transaction(transaction(3, 7, alice, Some(alice)), receipt());
        queue.wait_idle().await;

        assert_eq!(storage.create_account_calls(), 2);
        assert_eq!(queue.cached_accounts(), 2);

        let row = storage.get_transaction(B256::repeat_byte(2)).unwrap().unwrap();
        let from = storage.get_account(bob).unwrap().unwrap();
        let to = storage.get_account(alice).unwrap().unwrap();
        assert_eq!((row.from_id, row.to_id), (from.id, to.id));
        assert_eq!(queue.totals().transactions, 3);
    }

    #[tokio::test]
    async fn test_contract_creation_resolves_receipt_address() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());
        let deployer = Address::repeat_byte(0xde);
        let contract = Address::repeat_byte(0xc0);

        queue.add_block(block(9));
        queue.add_transaction(
            transaction(1, 9, deployer, None),
            Receipt { contract_address: Some(contract), ..receipt() },
        );
        queue.wait_idle().await;

        let account = storage.get_account(contract).unwrap().unwrap();
        assert!(account.is_contract);
        assert!(!storage.get_account(deployer).unwrap().unwrap().is_contract);

        let row = storage.get_transaction(B256::repeat_byte(1)).unwrap().unwrap();
        assert_eq!(row.to_id, account.id);
    }

    #[tokio::test]
    async fn test_missing_recipient_falls_back_to_zero_address() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());

        queue.add_block(block(9));
        queue.add_transaction(transaction(1, 9, Address::repeat_byte(0x01), None), receipt());
        queue.wait_idle().await;

        let zero = storage.get_account(Address::ZERO).unwrap().unwrap();
        let row = storage.get_transaction(B256::repeat_byte(1)).unwrap().unwrap();
        assert_eq!(row.to_id, zero.id);
    }

    #[tokio::test]
    async fn test_transactions_written_after_their_block() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());
        storage.fail_block_batches(2);

        queue.add_block(block(11));
        queue.add_transaction(
            transaction(1, 11, Address::repeat_byte(0x01), Some(Address::repeat_byte(0x02))),
            receipt(),
        );
        queue.wait_idle().await;

        assert!(storage.get_block(11).unwrap().is_some());
        assert!(storage.get_transaction(B256::repeat_byte(1)).unwrap().is_some());
        assert!(storage.transactions_written_before_blocks().is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_retried_item_by_item() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());
        storage.fail_block_batches(1);

        for number in 1..=3 {
            queue.add_block(block(number));
        }
        queue.wait_idle().await;

        for number in 1..=3 {
            assert!(storage.get_block(number).unwrap().is_some());
        }
        assert_eq!(queue.totals().failed_blocks, 0);
        assert_eq!(storage.latest_synced_block().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_poisoned_row_dropped_without_blocking_others() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());
        let poisoned = B256::repeat_byte(0x66);
        storage.reject_transaction(poisoned);

        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        queue.add_block(block(5));
        queue.add_transaction(transaction(0x65, 5, a, Some(b)), receipt());
        queue.add_transaction(transaction(0x66, 5, a, Some(b)), receipt());
        queue.add_transaction(transaction(0x67, 5, a, Some(b)), receipt());
        queue.wait_idle().await;

        assert!(storage.get_transaction(B256::repeat_byte(0x65)).unwrap().is_some());
        assert!(storage.get_transaction(B256::repeat_byte(0x67)).unwrap().is_some());
        assert!(storage.get_transaction(poisoned).unwrap().is_none());

        let totals = queue.totals();
        assert_eq!(totals.transactions, 2);
        assert_eq!(totals.failed_transactions, 1);
    }

    #[tokio::test]
    async fn test_watermark_held_by_expected_block() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());

        queue.expect_block(1);
        queue.expect_block(2);
        queue.add_block(block(2));
        queue.wait_idle().await;

        assert!(storage.get_block(2).unwrap().is_some());
        assert_eq!(queue.latest_block(), 0);
        assert_eq!(storage.latest_synced_block().unwrap(), 0);

        queue.add_block(block(1));
        queue.wait_idle().await;

        assert_eq!(queue.latest_block(), 2);
        assert_eq!(storage.latest_synced_block().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_watermark_held_by_unwritten_transactions() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());
        let tx = transaction(1, 4, Address::repeat_byte(0x01), Some(Address::repeat_byte(0x02)));

        queue.add_block(Block { transactions: vec![tx.hash], ..block(4) });
        queue.wait_idle().await;

        assert!(storage.get_block(4).unwrap().is_some());
        assert_eq!(storage.latest_synced_block().unwrap(), 0);

        queue.add_transaction(tx, receipt());
        queue.wait_idle().await;

        assert_eq!(storage.latest_synced_block().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_watermark_passes_dropped_block() {
        let storage = Arc::new(InMemoryStorage::default());
        let config = ScannerConfig { max_persist_retries: 1, ..config() };
        let queue = SyncQueue::new(Arc::clone(&storage), &config);
        // Both the first write and its retry fail.
        storage.fail_block_batches(2);

        queue.add_block(block(1));
        queue.wait_idle().await;

        assert!(storage.get_block(1).unwrap().is_none());
        assert_eq!(queue.totals().failed_blocks, 1);
        assert_eq!(storage.latest_synced_block().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_loop_restarts_after_drain() {
        let storage = Arc::new(InMemoryStorage::default());
        let queue = SyncQueue::new(Arc::clone(&storage), &config());

        queue.add_block(block(1));
        queue.wait_idle().await;
        assert_eq!(storage.update_settings_calls(), 1);

        queue.add_block(block(2));
        assert!(!queue.is_idle());
        queue.wait_idle().await;

        assert_eq!(storage.latest_synced_block().unwrap(), 2);
        assert_eq!(storage.update_settings_calls(), 2);
    }
}
