#![doc = "The `chainscan` indexer binary."]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use clap::Parser;

pub mod cli;
pub mod commands;

fn main() {
    chainscan_cli::backtrace::enable();

    if let Err(err) = cli::Cli::parse().run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
