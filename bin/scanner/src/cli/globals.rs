//! Global arguments for the CLI.

use super::ScannerArgs;
use chainscan_cli::MetricsArgs;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use url::Url;

/// Global arguments for the CLI.
#[derive(Parser, Clone, Debug)]
pub struct GlobalArgs {
    /// Verbosity level (0-2)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub v: u8,
    /// URL of the node's JSON-RPC endpoint.
    #[arg(long, env = "CHAINSCAN_RPC_URL")]
    pub rpc_url: Url,
    /// Timeout of a single RPC call, in milliseconds.
    #[arg(
        long,
        global = true,
        default_value_t = chainscan_rpc::DEFAULT_RPC_TIMEOUT,
        env = "CHAINSCAN_RPC_TIMEOUT"
    )]
    pub rpc_timeout: u64,
    /// Directory holding the database.
    #[arg(long, global = true, default_value = "chainscan-data", env = "CHAINSCAN_DATADIR")]
    pub datadir: PathBuf,
    /// Prometheus CLI arguments.
    #[command(flatten)]
    pub metrics: MetricsArgs,
    /// Pipeline tuning arguments.
    #[command(flatten)]
    pub scanner: ScannerArgs,
}
