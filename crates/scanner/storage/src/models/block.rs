//! Models for storing block rows in the database.

use chainscan_types::BlockRow;
use reth_codecs::Compact;
use reth_db_api::table::Table;
use serde::{Deserialize, Serialize};

/// Value of the [`Blocks`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Compact)]
pub struct BlockEntry {
    /// The timestamp of the block (seconds since Unix epoch).
    pub timestamp: u64,
    /// Number of transactions in the block.
    pub transaction_count: u64,
}

impl From<&BlockRow> for BlockEntry {
    fn from(row: &BlockRow) -> Self {
        Self { timestamp: row.timestamp, transaction_count: row.transaction_count }
    }
}

impl BlockEntry {
    /// Converts the entry into the [`BlockRow`] stored under `number`.
    pub const fn into_row(self, number: u64) -> BlockRow {
        BlockRow { number, timestamp: self.timestamp, transaction_count: self.transaction_count }
    }
}

/// A table for storing block rows by block number.
///
/// - **Key**: `u64`: block number
/// - **Value**: [`BlockEntry`]: block metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Blocks;

impl Table for Blocks {
    const NAME: &'static str = "blocks";
    const DUPSORT: bool = false;
    type Key = u64;
    type Value = BlockEntry;
}
