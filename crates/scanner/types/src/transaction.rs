use alloy_primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

/// A mined transaction as fetched from the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The transaction hash.
    pub hash: TxHash,
    /// The sender.
    pub from: Address,
    /// The recipient. `None` for contract creations.
    pub to: Option<Address>,
    /// The number of the block that includes the transaction.
    pub block_number: u64,
    /// Transferred value, in wei.
    pub value: U256,
    /// The gas limit set by the sender.
    pub gas_limit: u64,
}

impl Transaction {
    /// Returns true if the transaction deploys a contract.
    pub const fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Returns the account the transaction is addressed to.
    ///
    /// Contract creations have no `to` field, their recipient is the contract address reported by
    /// the receipt.
    pub fn recipient(&self, receipt: &Receipt) -> Option<Address> {
        self.to.or(receipt.contract_address)
    }
}

/// The execution outcome of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Receipt {
    /// The address of the deployed contract, for contract creations.
    pub contract_address: Option<Address>,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
    /// Whether the transaction succeeded.
    pub status: bool,
}

/// The storage shape of a [`Transaction`] with its endpoints resolved to account ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRow {
    /// The transaction hash, unique key of the row.
    pub hash: TxHash,
    /// Account id of the sender.
    pub from_id: u64,
    /// Account id of the recipient.
    pub to_id: u64,
    /// Number of the block that includes the transaction.
    pub block_number: u64,
    /// Transferred value, in wei.
    pub value: U256,
    /// The gas limit set by the sender.
    pub gas_limit: u64,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
    /// Whether the transaction succeeded.
    pub status: bool,
}
