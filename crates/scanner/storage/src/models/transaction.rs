//! Models for storing transaction rows in the database.

use alloy_primitives::{TxHash, U256};
use chainscan_types::TransactionRow;
use reth_codecs::Compact;
use reth_db_api::table::Table;
use serde::{Deserialize, Serialize};

/// Value of the [`Transactions`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Compact)]
pub struct TransactionEntry {
    /// Account id of the sender.
    pub from_id: u64,
    /// Account id of the recipient.
    pub to_id: u64,
    /// Number of the including block.
    pub block_number: u64,
    /// Transferred value, in wei.
    pub value: U256,
    /// Gas limit set by the sender.
    pub gas_limit: u64,
    /// Gas consumed.
    pub gas_used: u64,
    /// Execution status.
    pub status: bool,
}

impl From<&TransactionRow> for TransactionEntry {
    fn from(row: &TransactionRow) -> Self {
        Self {
            from_id: row.from_id,
            to_id: row.to_id,
            block_number: row.block_number,
            value: row.value,
            gas_limit: row.gas_limit,
            gas_used: row.gas_used,
            status: row.status,
        }
    }
}

impl TransactionEntry {
    /// Converts the entry into the [`TransactionRow`] stored under `hash`.
    pub const fn into_row(self, hash: TxHash) -> TransactionRow {
        TransactionRow {
            hash,
            from_id: self.from_id,
            to_id: self.to_id,
            block_number: self.block_number,
            value: self.value,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            status: self.status,
        }
    }
}

/// A table for storing transaction rows by hash.
///
/// - **Key**: [`TxHash`]: transaction hash
/// - **Value**: [`TransactionEntry`]: resolved transaction row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Transactions;

impl Table for Transactions {
    const NAME: &'static str = "transactions";
    const DUPSORT: bool = false;
    type Key = TxHash;
    type Value = TransactionEntry;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn test_transaction_entry_compact_roundtrip() {
        let entry = TransactionEntry {
            from_id: 1,
            to_id: 2,
            block_number: 1_701_040,
            value: U256::from(10_000_000_000_000_000u64),
            gas_limit: 666_666,
            gas_used: 21_000,
            status: true,
        };

        let mut buffer = Vec::new();
        let len = entry.to_compact(&mut buffer);
        let (decoded, _) = TransactionEntry::from_compact(&buffer, len);
        assert_eq!(decoded, entry);

        let row = decoded.into_row(B256::repeat_byte(0x6e));
        assert_eq!(TransactionEntry::from(&row), entry);
    }
}
