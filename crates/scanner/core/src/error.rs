use chainscan_rpc::RpcError;
use chainscan_storage::StorageError;
use thiserror::Error;
use tokio::task::JoinError;

/// Errors surfaced by the [`crate::Scanner`].
///
/// Per-item fetch and persist failures are retried inside the queues and never show up here.
#[derive(Debug, Error)]
pub enum ScannerError {
    /// The node could not be reached at startup or while reading the chain tip.
    #[error("node unreachable: {0}")]
    Unreachable(#[source] RpcError),

    /// A storage call failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(#[from] JoinError),

    /// [`crate::Scanner::run_sync`] was called before [`crate::Scanner::init`].
    #[error("scanner is not initialised")]
    NotInitialized,
}
