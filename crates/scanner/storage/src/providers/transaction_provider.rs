//! Provider for transaction row operations.

use crate::{
    error::StorageError,
    models::{TransactionEntry, Transactions},
};
use alloy_primitives::TxHash;
use chainscan_types::TransactionRow;
use reth_db_api::transaction::{DbTx, DbTxMut};
use tracing::{error, trace};

/// Provides access to transaction rows within a transaction.
#[derive(Debug)]
pub(crate) struct TransactionProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> TransactionProvider<'tx, TX> {
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> TransactionProvider<'_, TX>
where
    TX: DbTx,
{
    pub(crate) fn get_transaction(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionRow>, StorageError> {
        let entry = self.tx.get::<Transactions>(hash).inspect_err(|err| {
            error!(target: "scan_storage", %hash, ?err, "Failed to read transaction");
        })?;
        Ok(entry.map(|entry| entry.into_row(hash)))
    }
}

impl<TX> TransactionProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Inserts every row whose hash is not stored yet.
    ///
    /// Returns the number of inserted rows.
    pub(crate) fn insert_transactions(
        &self,
        rows: &[TransactionRow],
    ) -> Result<usize, StorageError> {
        let mut inserted = 0;
        for row in rows {
            if self.tx.get::<Transactions>(row.hash)?.is_some() {
                trace!(target: "scan_storage", hash = %row.hash, "Transaction already stored");
                continue;
            }

            self.tx.put::<Transactions>(row.hash, TransactionEntry::from(row)).inspect_err(
                |err| {
                    error!(
                        target: "scan_storage",
                        hash = %row.hash,
                        ?err,
                        "Failed to store transaction"
                    );
                },
            )?;
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tables;
    use alloy_primitives::{B256, U256};
    use reth_db::{
        DatabaseEnv,
        mdbx::{DatabaseArguments, init_db_for},
    };
    use reth_db_api::Database;
    use tempfile::TempDir;

    fn setup_db() -> (TempDir, DatabaseEnv) {
        let temp_dir = TempDir::new().expect("Could not create temp dir");
        let db = init_db_for::<_, Tables>(temp_dir.path(), DatabaseArguments::default())
            .expect("Failed to init database");
        (temp_dir, db)
    }

    fn row(hash: u8, block_number: u64) -> TransactionRow {
        TransactionRow {
            hash: B256::repeat_byte(hash),
            from_id: 1,
            to_id: 2,
            block_number,
            value: U256::from(7u64),
            gas_limit: 21_000,
            gas_used: 21_000,
            status: true,
        }
    }

    #[test]
    fn test_insert_transactions_dedups_by_hash() {
        let (_dir, db) = setup_db();
        let a = row(0x0a, 101);
        let b = row(0x0b, 102);

        let tx = db.tx_mut().expect("Failed to create write transaction");
        let provider = TransactionProvider::new(&tx);
        assert_eq!(provider.insert_transactions(&[a, b]).unwrap(), 2);
        assert_eq!(provider.insert_transactions(&[a]).unwrap(), 0);
        tx.commit().expect("Failed to commit");

        let tx = db.tx().expect("Failed to create read transaction");
        let provider = TransactionProvider::new(&tx);
        assert_eq!(provider.get_transaction(a.hash).unwrap(), Some(a));
        assert_eq!(provider.get_transaction(B256::ZERO).unwrap(), None);
    }
}
