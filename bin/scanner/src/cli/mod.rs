//! Contains the chainscan CLI.

pub mod globals;
pub use globals::GlobalArgs;

pub mod scanner;
pub use scanner::ScannerArgs;

use crate::commands::{BalanceCommand, SyncCommand};
use anyhow::Result;
use chainscan_cli::{CliResult, cli_styles, init_tracing_subscriber};
use clap::{Parser, Subcommand};
use std::future::Future;
use tracing_subscriber::EnvFilter;

/// Subcommands for the CLI.
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Index blocks and their transactions into the database.
    Sync(SyncCommand),
    /// Print the balance of an address as reported by the node.
    Balance(BalanceCommand),
}

/// The chainscan CLI.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, styles = cli_styles(), long_about = None)]
pub struct Cli {
    /// Global arguments for the CLI.
    #[command(flatten)]
    pub global: GlobalArgs,
    /// The subcommand to run.
    #[command(subcommand)]
    pub subcommand: Commands,
}

impl Cli {
    /// Runs the CLI.
    pub fn run(self) -> Result<()> {
        // Metrics are only worth serving for the long-running command.
        let serve_metrics = matches!(self.subcommand, Commands::Sync(_));
        self.init_stack(serve_metrics)?;

        match self.subcommand {
            Commands::Sync(sync) => Self::run_until_done(sync.run(self.global)),
            Commands::Balance(balance) => Self::run_until_done(balance.run(self.global)),
        }
    }

    /// Initializes the tracing subscriber and, if `serve_metrics` is set and metrics are
    /// enabled, the Prometheus exporter.
    pub fn init_stack(&self, serve_metrics: bool) -> CliResult<()> {
        init_tracing_subscriber(self.global.v, None::<EnvFilter>)?;

        if serve_metrics {
            self.global.metrics.init_metrics()?;
        }
        Ok(())
    }

    /// Drives `fut` to completion on a fresh multi-thread runtime.
    pub fn run_until_done<F>(fut: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let rt = Self::tokio_runtime()?;
        rt.block_on(fut)
    }

    /// Creates a new default tokio multi-thread [Runtime](tokio::runtime::Runtime) with all
    /// features enabled
    pub fn tokio_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()
    }
}
