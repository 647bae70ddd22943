//! In-memory storage and chain fakes for exercising the pipeline without a node or database.

use alloy_primitives::{Address, B256, TxHash, U256};
use alloy_transport::TransportErrorKind;
use async_trait::async_trait;
use chainscan_rpc::{ChainProvider, RpcError};
use chainscan_storage::{
    AccountStorage, BlockStorage, SettingsStorage, StorageError, TransactionStorage,
};
use chainscan_types::{
    Account, Block, BlockRow, NewAccount, Receipt, Settings, Transaction, TransactionRow,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

#[derive(Debug, Default)]
struct StorageState {
    accounts: Vec<Account>,
    ids: HashMap<Address, u64>,
    blocks: BTreeMap<u64, BlockRow>,
    transactions: HashMap<TxHash, TransactionRow>,
    settings: Settings,
    rejected_transactions: HashSet<TxHash>,
    failing_block_batches: usize,
    failing_account_creations: usize,
    orphan_transactions: Vec<TxHash>,
}

/// Storage backed by in-memory maps, with failure injection and call counters.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: Mutex<StorageState>,
    create_account_calls: AtomicUsize,
    update_settings_calls: AtomicUsize,
}

impl InMemoryStorage {
    /// Creates storage whose watermark is already at `latest_synced_block`.
    pub fn with_watermark(latest_synced_block: u64) -> Self {
        let storage = Self::default();
        storage.lock().settings = Settings::new(latest_synced_block);
        storage
    }

    fn lock(&self) -> MutexGuard<'_, StorageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes the next `count` block batches fail.
    pub fn fail_block_batches(&self, count: usize) {
        self.lock().failing_block_batches = count;
    }

    /// Makes the next `count` account creations fail.
    pub fn fail_account_creations(&self, count: usize) {
        self.lock().failing_account_creations = count;
    }

    /// Makes every transaction batch containing `hash` fail.
    pub fn reject_transaction(&self, hash: TxHash) {
        self.lock().rejected_transactions.insert(hash);
    }

    /// Number of `create_account` calls so far.
    pub fn create_account_calls(&self) -> usize {
        self.create_account_calls.load(Ordering::SeqCst)
    }

    /// Number of `update_settings` calls so far.
    pub fn update_settings_calls(&self) -> usize {
        self.update_settings_calls.load(Ordering::SeqCst)
    }

    /// Hashes of transactions that were written while their block was not stored.
    pub fn transactions_written_before_blocks(&self) -> Vec<TxHash> {
        self.lock().orphan_transactions.clone()
    }

    /// Every stored block row, ordered by number.
    pub fn blocks(&self) -> Vec<BlockRow> {
        self.lock().blocks.values().copied().collect()
    }

    /// Number of stored transaction rows.
    pub fn transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    /// Number of stored accounts.
    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }
}

impl AccountStorage for InMemoryStorage {
    fn create_account(&self, account: NewAccount) -> Result<(Account, bool), StorageError> {
        self.create_account_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();

        if state.failing_account_creations > 0 {
            state.failing_account_creations -= 1;
            return Err(StorageError::ConflictError("injected account failure".to_string()));
        }

        if let Some(id) = state.ids.get(&account.address) {
            return Ok((state.accounts[*id as usize - 1], false));
        }

        let id = state.accounts.len() as u64 + 1;
        let created = Account::new(id, account.address, account.is_contract);
        state.accounts.push(created);
        state.ids.insert(account.address, created.id);
        Ok((created, true))
    }

    fn get_account(&self, address: Address) -> Result<Option<Account>, StorageError> {
        let state = self.lock();
        Ok(state.ids.get(&address).map(|id| state.accounts[*id as usize - 1]))
    }
}

impl BlockStorage for InMemoryStorage {
    fn bulk_create_blocks(&self, rows: &[BlockRow]) -> Result<usize, StorageError> {
        let mut state = self.lock();

        if state.failing_block_batches > 0 {
            state.failing_block_batches -= 1;
            return Err(StorageError::ConflictError("injected block failure".to_string()));
        }

        let mut inserted = 0;
        for row in rows {
            if !state.blocks.contains_key(&row.number) {
                state.blocks.insert(row.number, *row);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn get_block(&self, number: u64) -> Result<Option<BlockRow>, StorageError> {
        Ok(self.lock().blocks.get(&number).copied())
    }
}

impl TransactionStorage for InMemoryStorage {
    fn bulk_create_transactions(&self, rows: &[TransactionRow]) -> Result<usize, StorageError> {
        let mut state = self.lock();

        let rejected = rows.iter().find(|row| state.rejected_transactions.contains(&row.hash));
        if let Some(row) = rejected {
            return Err(StorageError::ConflictError(format!("rejected transaction {}", row.hash)));
        }

        let mut inserted = 0;
        for row in rows {
            if state.transactions.contains_key(&row.hash) {
                continue;
            }
            if !state.blocks.contains_key(&row.block_number) {
                state.orphan_transactions.push(row.hash);
            }
            state.transactions.insert(row.hash, *row);
            inserted += 1;
        }
        Ok(inserted)
    }

    fn get_transaction(&self, hash: TxHash) -> Result<Option<TransactionRow>, StorageError> {
        Ok(self.lock().transactions.get(&hash).copied())
    }
}

impl SettingsStorage for InMemoryStorage {
    fn update_settings(&self, settings: Settings) -> Result<(), StorageError> {
        self.update_settings_calls.fetch_add(1, Ordering::SeqCst);
        self.lock().settings = settings;
        Ok(())
    }

    fn settings(&self) -> Result<Settings, StorageError> {
        Ok(self.lock().settings)
    }
}

#[derive(Debug, Default)]
struct ChainState {
    tip: u64,
    blocks: BTreeMap<u64, Block>,
    transactions: HashMap<TxHash, Transaction>,
    receipts: HashMap<TxHash, Receipt>,
    balances: HashMap<Address, U256>,
    block_misses: HashMap<u64, usize>,
    transaction_misses: HashMap<TxHash, usize>,
    receipt_misses: HashMap<TxHash, usize>,
    block_calls: HashMap<u64, usize>,
    block_latency: Duration,
    unreachable: bool,
}

/// Consumes one injected miss for `key`, if any is left.
fn take_miss<K: std::hash::Hash + Eq>(misses: &mut HashMap<K, usize>, key: &K) -> bool {
    match misses.get_mut(key) {
        Some(left) if *left > 0 => {
            *left -= 1;
            true
        }
        _ => false,
    }
}

/// A chain held in memory, answering like a node would.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    state: Mutex<ChainState>,
    transaction_calls: AtomicUsize,
    receipt_calls: AtomicUsize,
    active_block_calls: AtomicUsize,
    peak_block_calls: AtomicUsize,
}

impl InMemoryChain {
    /// Creates a chain with empty blocks `1..=tip`.
    pub fn with_empty_blocks(tip: u64) -> Self {
        let chain = Self::default();
        for number in 1..=tip {
            chain.insert_block(number);
        }
        chain
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds an empty block, raising the tip if needed.
    pub fn insert_block(&self, number: u64) {
        let mut state = self.lock();
        state.blocks.entry(number).or_insert_with(|| Block {
            number,
            timestamp: 1_438_269_973 + number * 12,
            transactions: vec![],
        });
        state.tip = state.tip.max(number);
    }

    /// Adds a transaction to block `number` and returns its hash.
    ///
    /// A `to` of `None` makes a contract creation deploying `contract`.
    pub fn insert_transaction(
        &self,
        number: u64,
        from: Address,
        to: Option<Address>,
        contract: Option<Address>,
    ) -> TxHash {
        self.insert_block(number);
        let mut state = self.lock();

        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&(state.transactions.len() as u64 + 1).to_be_bytes());
        bytes[24..].copy_from_slice(&number.to_be_bytes());
        let hash = B256::from(bytes);
        let transaction = Transaction {
            hash,
            from,
            to,
            block_number: number,
            value: U256::from(1_000u64),
            gas_limit: 90_000,
        };
        let receipt = Receipt { contract_address: contract, gas_used: 21_000, status: true };

        state.transactions.insert(hash, transaction);
        state.receipts.insert(hash, receipt);
        if let Some(block) = state.blocks.get_mut(&number) {
            block.transactions.push(hash);
        }
        hash
    }

    /// Makes the next `times` fetches of block `number` come back empty.
    pub fn miss_block(&self, number: u64, times: usize) {
        self.lock().block_misses.insert(number, times);
    }

    /// Makes the next `times` fetches of transaction `hash` come back empty.
    pub fn miss_transaction(&self, hash: TxHash, times: usize) {
        self.lock().transaction_misses.insert(hash, times);
    }

    /// Makes the next `times` fetches of the receipt of `hash` come back empty.
    pub fn miss_receipt(&self, hash: TxHash, times: usize) {
        self.lock().receipt_misses.insert(hash, times);
    }

    /// Makes every block fetch take `latency` before answering.
    pub fn set_block_latency(&self, latency: Duration) {
        self.lock().block_latency = latency;
    }

    /// Makes every call fail as if the node were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Sets the balance reported for `address`.
    pub fn set_balance(&self, address: Address, balance: U256) {
        self.lock().balances.insert(address, balance);
    }

    /// Number of fetches of block `number` so far.
    pub fn block_calls(&self, number: u64) -> usize {
        self.lock().block_calls.get(&number).copied().unwrap_or_default()
    }

    /// Number of transaction fetches so far.
    pub fn transaction_calls(&self) -> usize {
        self.transaction_calls.load(Ordering::SeqCst)
    }

    /// Number of receipt fetches so far.
    pub fn receipt_calls(&self) -> usize {
        self.receipt_calls.load(Ordering::SeqCst)
    }

    /// Highest number of block fetches that were in progress at the same time.
    pub fn peak_block_calls(&self) -> usize {
        self.peak_block_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), RpcError> {
        if self.lock().unreachable {
            let err = TransportErrorKind::custom_str("connection refused");
            return Err(RpcError::Transport(err));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainProvider for InMemoryChain {
    async fn block_number(&self) -> Result<u64, RpcError> {
        self.check_reachable()?;
        Ok(self.lock().tip)
    }

    async fn block(&self, number: u64) -> Result<Option<Block>, RpcError> {
        self.check_reachable()?;
        let active = self.active_block_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_block_calls.fetch_max(active, Ordering::SeqCst);

        let latency = self.lock().block_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let block = {
            let mut state = self.lock();
            *state.block_calls.entry(number).or_default() += 1;
            if take_miss(&mut state.block_misses, &number) {
                None
            } else {
                state.blocks.get(&number).cloned()
            }
        };
        self.active_block_calls.fetch_sub(1, Ordering::SeqCst);
        Ok(block)
    }

    async fn transaction(&self, hash: TxHash) -> Result<Option<Transaction>, RpcError> {
        self.check_reachable()?;
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if take_miss(&mut state.transaction_misses, &hash) {
            return Ok(None);
        }
        Ok(state.transactions.get(&hash).cloned())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, RpcError> {
        self.check_reachable()?;
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if take_miss(&mut state.receipt_misses, &hash) {
            return Ok(None);
        }
        Ok(state.receipts.get(&hash).copied())
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcError> {
        self.check_reachable()?;
        Ok(self.lock().balances.get(&address).copied().unwrap_or_default())
    }
}
