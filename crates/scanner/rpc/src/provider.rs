//! The [`ChainProvider`] trait and its alloy-backed implementation.

use crate::{
    RpcError,
    normalize::{normalize_block, normalize_receipt, normalize_transaction},
};
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_transport::TransportResult;
use async_trait::async_trait;
use chainscan_types::{Block, Receipt, Transaction};
use std::{fmt::Debug, future::IntoFuture, time::Duration};
use tracing::trace;
use url::Url;

/// Default timeout for node requests in milliseconds.
pub const DEFAULT_RPC_TIMEOUT: u64 = 10_000;

/// Read access to a node's chain data.
///
/// Responses are normalized into the indexer's own types. A value the node does not know about
/// yet is `Ok(None)`, which callers treat as a transient miss rather than an error.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait ChainProvider: Debug + Send + Sync {
    /// Returns the number of the most recent block.
    async fn block_number(&self) -> Result<u64, RpcError>;

    /// Fetches the block at `number` with its transaction hashes.
    async fn block(&self, number: u64) -> Result<Option<Block>, RpcError>;

    /// Fetches a mined transaction by hash. Pending transactions are returned as `None`.
    async fn transaction(&self, hash: TxHash) -> Result<Option<Transaction>, RpcError>;

    /// Fetches the receipt of a transaction.
    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, RpcError>;

    /// Returns the latest balance of `address`, in wei.
    async fn balance(&self, address: Address) -> Result<U256, RpcError>;
}

/// Builder for an [`AlloyChainProvider`].
#[derive(Debug, Clone)]
pub struct ChainProviderBuilder {
    /// The node's HTTP RPC endpoint.
    pub url: Url,
    /// The per-request timeout.
    pub timeout: Duration,
}

impl ChainProviderBuilder {
    /// Creates a new builder for the given endpoint.
    pub const fn new(url: Url) -> Self {
        Self { url, timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT) }
    }

    /// Sets the per-request timeout.
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the [`AlloyChainProvider`].
    pub fn build(self) -> AlloyChainProvider {
        AlloyChainProvider { inner: RootProvider::new_http(self.url), timeout: self.timeout }
    }
}

/// A [`ChainProvider`] talking JSON-RPC over HTTP through an alloy [`RootProvider`].
#[derive(Debug, Clone)]
pub struct AlloyChainProvider {
    inner: RootProvider,
    timeout: Duration,
}

impl AlloyChainProvider {
    /// Awaits `request`, failing with [`RpcError::Timeout`] once the timeout elapses.
    async fn request<T, F>(&self, method: &'static str, request: F) -> Result<T, RpcError>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        trace!(target: "rpc", method, "Sending request");
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RpcError::Timeout { method, timeout: self.timeout }),
        }
    }
}

#[async_trait]
impl ChainProvider for AlloyChainProvider {
    async fn block_number(&self) -> Result<u64, RpcError> {
        self.request("eth_blockNumber", self.inner.get_block_number()).await
    }

    async fn block(&self, number: u64) -> Result<Option<Block>, RpcError> {
        let block = self
            .request(
                "eth_getBlockByNumber",
                self.inner.get_block_by_number(BlockNumberOrTag::Number(number)),
            )
            .await?;
        Ok(block.map(normalize_block))
    }

    async fn transaction(&self, hash: TxHash) -> Result<Option<Transaction>, RpcError> {
        let tx = self
            .request("eth_getTransactionByHash", self.inner.get_transaction_by_hash(hash))
            .await?;
        Ok(tx.as_ref().and_then(normalize_transaction))
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, RpcError> {
        let receipt = self
            .request("eth_getTransactionReceipt", self.inner.get_transaction_receipt(hash))
            .await?;
        Ok(receipt.as_ref().map(normalize_receipt))
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcError> {
        self.request("eth_getBalance", self.inner.get_balance(address)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_timeout() {
        let url = Url::parse("http://localhost:8545").unwrap();
        let builder = ChainProviderBuilder::new(url.clone());
        assert_eq!(builder.timeout, Duration::from_millis(DEFAULT_RPC_TIMEOUT));

        let provider = builder.timeout(Duration::from_secs(2)).build();
        assert_eq!(provider.timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        // Nothing listens on the discard port.
        let url = Url::parse("http://127.0.0.1:9").unwrap();
        let provider = ChainProviderBuilder::new(url).timeout(Duration::from_secs(5)).build();

        assert!(provider.block_number().await.is_err());
    }
}
