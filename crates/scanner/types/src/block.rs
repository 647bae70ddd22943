use alloy_primitives::TxHash;
use serde::{Deserialize, Serialize};

/// A block as fetched from the node, reduced to the fields the indexer keeps.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    /// The block number.
    pub number: u64,
    /// The block timestamp, in seconds since the Unix epoch.
    pub timestamp: u64,
    /// Hashes of the transactions included in the block, in block order.
    pub transactions: Vec<TxHash>,
}

impl Block {
    /// Returns the number of transactions in the block.
    pub const fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Maps the block to its storage row.
    pub const fn to_row(&self) -> BlockRow {
        BlockRow {
            number: self.number,
            timestamp: self.timestamp,
            transaction_count: self.transactions.len() as u64,
        }
    }
}

/// The storage shape of a [`Block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockRow {
    /// The block number, unique key of the row.
    pub number: u64,
    /// The block timestamp, in seconds since the Unix epoch.
    pub timestamp: u64,
    /// Number of transactions in the block.
    pub transaction_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn test_block_to_row() {
        let block = Block {
            number: 101,
            timestamp: 1_462_285_256,
            transactions: vec![B256::repeat_byte(1), B256::repeat_byte(2)],
        };

        assert_eq!(block.transaction_count(), 2);
        assert_eq!(
            block.to_row(),
            BlockRow { number: 101, timestamp: 1_462_285_256, transaction_count: 2 }
        );
    }

    #[test]
    fn test_empty_block_row() {
        let block = Block { number: 7, ..Default::default() };
        assert_eq!(block.to_row().transaction_count, 0);
    }
}
