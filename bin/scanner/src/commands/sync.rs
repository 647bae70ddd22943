//! The `sync` subcommand.

use super::chain_provider;
use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use chainscan_core::{Scanner, SyncReport, SyncTarget};
use chainscan_storage::ScanDb;
use clap::{ArgGroup, Parser};
use std::sync::Arc;
use tracing::info;

/// Indexes blocks after the stored watermark.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(group(ArgGroup::new("target").required(true).args(["blocks", "live"])))]
pub struct SyncCommand {
    /// Number of blocks to index after the watermark.
    #[arg(long)]
    pub blocks: Option<u64>,
    /// Follow the chain tip until interrupted.
    #[arg(long)]
    pub live: bool,
}

impl SyncCommand {
    /// Returns how far the run goes.
    pub fn target(&self) -> SyncTarget {
        self.blocks.map_or(SyncTarget::Live, SyncTarget::Blocks)
    }

    /// Runs the subcommand.
    pub async fn run(self, global: GlobalArgs) -> Result<()> {
        let storage = ScanDb::new(&global.datadir)
            .with_context(|| format!("failed to open database at {}", global.datadir.display()))?;
        let provider = chain_provider(&global);

        let mut scanner =
            Scanner::new(Arc::new(provider), Arc::new(storage), global.scanner.config());
        let watermark = scanner.init().await?;
        info!(target: "chainscan", watermark, rpc = %global.rpc_url, "Starting sync");

        match self.target() {
            target @ SyncTarget::Blocks(_) => {
                let report = scanner.run_sync(target).await?;
                log_report(&report);
                Ok(())
            }
            SyncTarget::Live => {
                tokio::select! {
                    res = scanner.run_sync(SyncTarget::Live) => {
                        res.map(|_| ()).map_err(anyhow::Error::from)
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!(
                            target: "chainscan",
                            latest_synced_block = scanner.latest_synced_block(),
                            "Received Ctrl-C, shutting down"
                        );
                        Ok(())
                    }
                }
            }
        }
    }
}

fn log_report(report: &SyncReport) {
    info!(
        target: "chainscan",
        from = report.from,
        to = report.to,
        blocks = report.blocks,
        transactions = report.transactions,
        failed_blocks = report.failed_blocks,
        failed_transactions = report.failed_transactions,
        latest_synced_block = report.latest_synced_block,
        elapsed = ?report.elapsed,
        "Sync complete"
    );
}
