use reth_db::DatabaseError;
use thiserror::Error;

/// Errors that may occur while interacting with indexer storage.
///
/// This enum is used across all implementations of the storage traits.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to open or initialise the database environment.
    #[error("failed to initialise database: {0}")]
    DatabaseInit(#[from] eyre::Report),

    /// A read or write against the database failed.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The expected entry was not found in the database.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Represents a conflict occurred while attempting to write to the database.
    #[error("conflict error: {0}")]
    ConflictError(String),
}
