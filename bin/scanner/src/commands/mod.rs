//! Subcommands of the chainscan CLI.

mod sync;
pub use sync::SyncCommand;

mod balance;
pub use balance::BalanceCommand;

use crate::cli::GlobalArgs;
use chainscan_rpc::{AlloyChainProvider, ChainProviderBuilder};
use std::time::Duration;

/// Builds the RPC client described by the global flags.
pub(crate) fn chain_provider(global: &GlobalArgs) -> AlloyChainProvider {
    ChainProviderBuilder::new(global.rpc_url.clone())
        .timeout(Duration::from_millis(global.rpc_timeout))
        .build()
}
