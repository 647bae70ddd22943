//! Shared utilities for the chainscan binaries.
//!
//! Tracing subscriber setup, the Prometheus exporter and its flags, backtrace defaults and clap
//! styling.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod backtrace;

mod error;
pub use error::{CliError, CliResult, PrometheusError};

mod styles;
pub use styles::cli_styles;

mod log;
pub use log::{init_tracing_subscriber, verbosity_level};

mod prometheus;
pub use prometheus::init_prometheus_server;

pub mod metrics_args;
pub use metrics_args::MetricsArgs;
