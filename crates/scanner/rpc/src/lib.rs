//! Node RPC access for the chainscan indexer.
//!
//! [`ChainProvider`] is the seam the pipeline fetches through. [`AlloyChainProvider`] implements
//! it over HTTP JSON-RPC and normalizes responses into `chainscan-types`.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod error;
pub use error::RpcError;

mod normalize;

mod provider;
#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockChainProvider;
pub use provider::{AlloyChainProvider, ChainProvider, ChainProviderBuilder, DEFAULT_RPC_TIMEOUT};
