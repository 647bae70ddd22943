//! The `balance` subcommand.

use super::chain_provider;
use crate::cli::GlobalArgs;
use alloy_primitives::Address;
use anyhow::{Result, anyhow};
use chainscan_rpc::ChainProvider;
use clap::Parser;

/// Prints the balance of an address, in wei.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct BalanceCommand {
    /// The address to query.
    pub address: Address,
}

impl BalanceCommand {
    /// Runs the subcommand.
    pub async fn run(self, global: GlobalArgs) -> Result<()> {
        let provider = chain_provider(&global);
        let balance = provider
            .balance(self.address)
            .await
            .map_err(|err| anyhow!("failed to fetch balance of {}: {err}", self.address))?;

        println!("{balance}");
        Ok(())
    }
}
