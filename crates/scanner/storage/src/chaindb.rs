//! Main database access structure.

use crate::{
    error::StorageError,
    providers::{AccountProvider, BlockProvider, SettingsProvider, TransactionProvider},
    traits::{AccountStorage, BlockStorage, SettingsStorage, TransactionStorage},
};
use alloy_primitives::{Address, TxHash};
use chainscan_types::{Account, BlockRow, NewAccount, Settings, TransactionRow};
use reth_db::{
    DatabaseEnv,
    mdbx::{DatabaseArguments, init_db_for},
};
use reth_db_api::{database::Database, transaction::DbTx};
use std::path::Path;
use tracing::{debug, error};

/// Manages the database environment of the indexer.
/// Provides transactional access to data via providers.
#[derive(Debug)]
pub struct ScanDb {
    env: DatabaseEnv,
}

impl ScanDb {
    /// Creates or opens a database environment at the given path.
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let env = init_db_for::<_, crate::models::Tables>(path, DatabaseArguments::default())?;
        debug!(target: "scan_storage", path = %path.display(), "Opened database");
        Ok(Self { env })
    }

    /// Runs `f` in a write transaction, committing only if it succeeds.
    fn write<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&<DatabaseEnv as Database>::TXMut) -> Result<T, StorageError>,
    {
        let tx = self.env.tx_mut()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().inspect_err(|err| {
                    error!(target: "scan_storage", ?err, "Failed to commit write transaction");
                })?;
                Ok(value)
            }
            Err(err) => {
                tx.abort();
                Err(err)
            }
        }
    }
}

impl AccountStorage for ScanDb {
    fn create_account(&self, account: NewAccount) -> Result<(Account, bool), StorageError> {
        self.write(|tx| AccountProvider::new(tx).create_account(account))
    }

    fn get_account(&self, address: Address) -> Result<Option<Account>, StorageError> {
        self.env.view(|tx| AccountProvider::new(tx).get_account(address))?
    }
}

impl BlockStorage for ScanDb {
    fn bulk_create_blocks(&self, rows: &[BlockRow]) -> Result<usize, StorageError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.write(|tx| BlockProvider::new(tx).insert_blocks(rows))
    }

    fn get_block(&self, number: u64) -> Result<Option<BlockRow>, StorageError> {
        self.env.view(|tx| BlockProvider::new(tx).get_block(number))?
    }
}

impl TransactionStorage for ScanDb {
    fn bulk_create_transactions(&self, rows: &[TransactionRow]) -> Result<usize, StorageError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.write(|tx| TransactionProvider::new(tx).insert_transactions(rows))
    }

    fn get_transaction(&self, hash: TxHash) -> Result<Option<TransactionRow>, StorageError> {
        self.env.view(|tx| TransactionProvider::new(tx).get_transaction(hash))?
    }
}

impl SettingsStorage for ScanDb {
    fn update_settings(&self, settings: Settings) -> Result<(), StorageError> {
        self.write(|tx| SettingsProvider::new(tx).update_settings(settings))
    }

    fn settings(&self) -> Result<Settings, StorageError> {
        self.env.view(|tx| SettingsProvider::new(tx).settings())?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U256};
    use std::{sync::Arc, thread};
    use tempfile::TempDir;

    fn setup_db() -> (TempDir, ScanDb) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = ScanDb::new(&tmp_dir.path().join("scandb")).expect("create database");
        (tmp_dir, db)
    }

    #[test]
    fn test_create_and_open_db() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db_path = tmp_dir.path().join("scandb");
        let db = ScanDb::new(&db_path);
        assert!(db.is_ok(), "Should create or open database");
    }

    #[test]
    fn test_watermark_survives_reopen() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db_path = tmp_dir.path().join("scandb");

        {
            let db = ScanDb::new(&db_path).unwrap();
            assert_eq!(db.latest_synced_block().unwrap(), 0);
            db.update_settings(Settings::new(102)).unwrap();
        }

        let db = ScanDb::new(&db_path).unwrap();
        assert_eq!(db.latest_synced_block().unwrap(), 102);
    }

    #[test]
    fn test_create_account_is_idempotent() {
        let (_dir, db) = setup_db();
        let address = Address::repeat_byte(0x11);

        let (first, created) = db.create_account(NewAccount::external(address)).unwrap();
        assert!(created);
        let (second, created) = db.create_account(NewAccount::external(address)).unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(db.get_account(address).unwrap(), Some(first));
    }

    #[test]
    fn test_concurrent_create_account_assigns_one_id() {
        let (_dir, db) = setup_db();
        let db = Arc::new(db);
        let address = Address::repeat_byte(0x22);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                thread::spawn(move || db.create_account(NewAccount::external(address)).unwrap())
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let created = results.iter().filter(|(_, created)| *created).count();
        assert_eq!(created, 1);
        assert!(results.iter().all(|(account, _)| account.id == results[0].0.id));
    }

    #[test]
    fn test_bulk_create_is_idempotent() {
        let (_dir, db) = setup_db();
        let blocks = [
            BlockRow { number: 101, timestamp: 10, transaction_count: 1 },
            BlockRow { number: 102, timestamp: 22, transaction_count: 0 },
        ];
        let row = TransactionRow {
            hash: B256::repeat_byte(0x33),
            from_id: 1,
            to_id: 2,
            block_number: 101,
            value: U256::ZERO,
            gas_limit: 50_000,
            gas_used: 21_000,
            status: false,
        };

        assert_eq!(db.bulk_create_blocks(&blocks).unwrap(), 2);
        assert_eq!(db.bulk_create_blocks(&blocks).unwrap(), 0);
        assert_eq!(db.bulk_create_blocks(&[]).unwrap(), 0);

        assert_eq!(db.bulk_create_transactions(&[row]).unwrap(), 1);
        assert_eq!(db.bulk_create_transactions(&[row]).unwrap(), 0);
        assert_eq!(db.get_transaction(row.hash).unwrap(), Some(row));
        assert_eq!(db.get_block(102).unwrap(), Some(blocks[1]));
    }
}
