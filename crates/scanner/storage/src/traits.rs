use crate::StorageError;
use alloy_primitives::{Address, TxHash};
use chainscan_types::{Account, BlockRow, NewAccount, Settings, TransactionRow};
use std::fmt::Debug;

/// Provides an interface for account identity storage.
///
/// Implementations must guarantee that at most one id is ever assigned per address, even when
/// [`AccountStorage::create_account`] is called concurrently for the same address.
pub trait AccountStorage {
    /// Finds the account for `account.address`, creating it if it does not exist yet.
    ///
    /// # Returns
    /// * `Ok((Account, true))` if the account was created by this call.
    /// * `Ok((Account, false))` if the account already existed. The stored contract flag is kept.
    /// * `Err(StorageError)` if the lookup or insert failed.
    fn create_account(&self, account: NewAccount) -> Result<(Account, bool), StorageError>;

    /// Gets the account assigned to `address`, if any.
    fn get_account(&self, address: Address) -> Result<Option<Account>, StorageError>;
}

/// Provides an interface for block row storage.
pub trait BlockStorage {
    /// Persists a batch of block rows in one write transaction.
    ///
    /// Rows whose block number is already stored are skipped, so re-running a range is
    /// idempotent. Either every new row is committed or none is.
    ///
    /// # Returns
    /// * `Ok(usize)` with the number of rows actually inserted.
    /// * `Err(StorageError)` if the batch could not be committed.
    fn bulk_create_blocks(&self, rows: &[BlockRow]) -> Result<usize, StorageError>;

    /// Gets the block row stored for `number`, if any.
    fn get_block(&self, number: u64) -> Result<Option<BlockRow>, StorageError>;
}

/// Provides an interface for transaction row storage.
pub trait TransactionStorage {
    /// Persists a batch of transaction rows in one write transaction.
    ///
    /// Rows whose hash is already stored are skipped. Either every new row is committed or none
    /// is.
    ///
    /// # Returns
    /// * `Ok(usize)` with the number of rows actually inserted.
    /// * `Err(StorageError)` if the batch could not be committed.
    fn bulk_create_transactions(&self, rows: &[TransactionRow]) -> Result<usize, StorageError>;

    /// Gets the transaction row stored for `hash`, if any.
    fn get_transaction(&self, hash: TxHash) -> Result<Option<TransactionRow>, StorageError>;
}

/// Provides an interface for the singleton settings record.
pub trait SettingsStorage {
    /// Overwrites the stored settings.
    fn update_settings(&self, settings: Settings) -> Result<(), StorageError>;

    /// Gets the stored settings. Returns the default settings if none were written yet.
    fn settings(&self) -> Result<Settings, StorageError>;

    /// Returns the highest fully persisted block number, the resume point of a sync.
    fn latest_synced_block(&self) -> Result<u64, StorageError> {
        Ok(self.settings()?.latest_synced_block)
    }
}

/// Combines every storage capability needed by the indexing pipeline.
pub trait ScanStorage:
    AccountStorage + BlockStorage + TransactionStorage + SettingsStorage + Debug + Send + Sync
{
}

impl<T> ScanStorage for T where
    T: AccountStorage + BlockStorage + TransactionStorage + SettingsStorage + Debug + Send + Sync
{
}
