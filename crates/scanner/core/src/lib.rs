//! The indexing pipeline of chainscan.
//!
//! A sync run moves data through two stages:
//!
//! - The [`DownloadQueue`] fetches blocks and their transactions from a
//!   [`chainscan_rpc::ChainProvider`], retrying failed fetches until they succeed.
//! - The [`SyncQueue`] resolves transaction endpoints to account ids through the
//!   [`AccountCache`] and writes blocks and transactions to a
//!   [`chainscan_storage::ScanStorage`] in batches.
//!
//! The [`Scanner`] wires both stages together, feeds block numbers from the stored watermark and
//! waits for the stages to drain.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod blocking;

mod cache;
pub use cache::AccountCache;

mod config;
pub use config::ScannerConfig;

mod download;
pub use download::DownloadQueue;

mod error;
pub use error::ScannerError;

mod metrics;

mod scanner;
pub use scanner::{Scanner, SyncReport, SyncTarget};

mod sync;
pub use sync::{SyncQueue, SyncTotals};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
