use crate::ScannerError;
use chainscan_storage::StorageError;
use std::sync::Arc;

/// Runs a storage call on the blocking pool.
pub(crate) async fn run_blocking<S, T, F>(storage: &Arc<S>, f: F) -> Result<T, ScannerError>
where
    S: Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StorageError> + Send + 'static,
{
    let storage = Arc::clone(storage);
    Ok(tokio::task::spawn_blocking(move || f(&storage)).await??)
}
