//! Provider for block row operations.

use crate::{
    error::StorageError,
    models::{BlockEntry, Blocks},
};
use chainscan_types::BlockRow;
use reth_db_api::transaction::{DbTx, DbTxMut};
use tracing::{error, trace};

/// Provides access to block rows within a transaction.
#[derive(Debug)]
pub(crate) struct BlockProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> BlockProvider<'tx, TX> {
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> BlockProvider<'_, TX>
where
    TX: DbTx,
{
    pub(crate) fn get_block(&self, number: u64) -> Result<Option<BlockRow>, StorageError> {
        let entry = self.tx.get::<Blocks>(number).inspect_err(|err| {
            error!(target: "scan_storage", block_number = number, ?err, "Failed to read block");
        })?;
        Ok(entry.map(|entry| entry.into_row(number)))
    }
}

impl<TX> BlockProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Inserts every row whose block number is not stored yet.
    ///
    /// Returns the number of inserted rows.
    pub(crate) fn insert_blocks(&self, rows: &[BlockRow]) -> Result<usize, StorageError> {
        let mut inserted = 0;
        for row in rows {
            if self.get_block(row.number)?.is_some() {
                trace!(target: "scan_storage", block_number = row.number, "Block already stored");
                continue;
            }

            self.tx.put::<Blocks>(row.number, BlockEntry::from(row)).inspect_err(|err| {
                error!(
                    target: "scan_storage",
                    block_number = row.number,
                    ?err,
                    "Failed to store block"
                );
            })?;
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tables;
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

    #[test]
    fn test_insert_blocks_skips_existing() {
        let (_dir, db) = setup_db();
        let first = BlockRow { number: 101, timestamp: 1_000, transaction_count: 2 };
        let second = BlockRow { number: 102, timestamp: 1_012, transaction_count: 0 };

        let tx = db.tx_mut().expect("Failed to create write transaction");
        let provider = BlockProvider::new(&tx);
        assert_eq!(provider.insert_blocks(&[first]).unwrap(), 1);

        // A conflicting row for an existing number is ignored.
        let stale = BlockRow { timestamp: 9_999, ..first };
        assert_eq!(provider.insert_blocks(&[stale, second]).unwrap(), 1);
        tx.commit().expect("Failed to commit");

        let tx = db.tx().expect("Failed to create read transaction");
        let provider = BlockProvider::new(&tx);
        assert_eq!(provider.get_block(101).unwrap(), Some(first));
        assert_eq!(provider.get_block(102).unwrap(), Some(second));
        assert_eq!(provider.get_block(103).unwrap(), None);
    }
}
