//! Work envelopes passed between the pipeline stages.

use crate::{Block, Receipt, Transaction};
use alloy_primitives::TxHash;

/// A unit of queued work with the number of times it has been retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<T> {
    /// The wrapped work item.
    pub item: T,
    /// Number of failed attempts so far.
    pub retries: u32,
}

impl<T> Envelope<T> {
    /// Wraps a fresh item.
    pub const fn new(item: T) -> Self {
        Self { item, retries: 0 }
    }

    /// Returns the same item with its retry counter bumped.
    pub const fn retry(mut self) -> Self {
        self.retries = self.retries.saturating_add(1);
        self
    }
}

/// A block number waiting to be fetched.
pub type BlockFetch = Envelope<u64>;

/// A transaction hash waiting to be fetched together with its receipt.
pub type TransactionFetch = Envelope<TxHash>;

/// A fetched block waiting to be written.
pub type BlockPersist = Envelope<Block>;

/// A fetched transaction waiting for account resolution and write.
pub type TransactionPersist = Envelope<PendingTransaction>;

/// A fetched transaction and receipt with account placeholders.
///
/// `from` and `to` start unresolved and are filled with storage account ids by the sync queue.
/// Resolved ids are kept across retries so a transaction is never resolved twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// The fetched transaction.
    pub transaction: Transaction,
    /// The fetched receipt.
    pub receipt: Receipt,
    /// Resolved sender account id.
    pub from: Option<u64>,
    /// Resolved recipient account id.
    pub to: Option<u64>,
}

impl PendingTransaction {
    /// Creates a pending transaction with both endpoints unresolved.
    pub const fn new(transaction: Transaction, receipt: Receipt) -> Self {
        Self { transaction, receipt, from: None, to: None }
    }

    /// Returns the transaction hash.
    pub const fn hash(&self) -> TxHash {
        self.transaction.hash
    }

    /// Returns the number of the block the transaction belongs to.
    pub const fn block_number(&self) -> u64 {
        self.transaction.block_number
    }
}
