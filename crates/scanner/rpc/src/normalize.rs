//! Conversions from node responses into the indexer's types.

use alloy_consensus::Transaction as _;
use alloy_network::{ReceiptResponse, TransactionResponse};
use alloy_rpc_types_eth::{
    Block as RpcBlock, Transaction as RpcTransaction, TransactionReceipt as RpcReceipt,
};
use chainscan_types::{Block, Receipt, Transaction};

/// Keeps the number, timestamp and transaction hashes of a block.
pub(crate) fn normalize_block(block: RpcBlock) -> Block {
    Block {
        number: block.header.number,
        timestamp: block.header.timestamp,
        transactions: block.transactions.hashes().collect(),
    }
}

/// Returns `None` for a transaction that is not mined yet.
pub(crate) fn normalize_transaction(tx: &RpcTransaction) -> Option<Transaction> {
    let block_number = TransactionResponse::block_number(tx)?;
    Some(Transaction {
        hash: tx.tx_hash(),
        from: TransactionResponse::from(tx),
        to: tx.to(),
        block_number,
        value: tx.value(),
        gas_limit: tx.gas_limit(),
    })
}

pub(crate) fn normalize_receipt(receipt: &RpcReceipt) -> Receipt {
    Receipt {
        contract_address: receipt.contract_address(),
        gas_used: receipt.gas_used(),
        status: receipt.status(),
    }
}
