//! Prometheus metrics CLI flags.

use crate::{PrometheusError, init_prometheus_server};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Flags controlling the Prometheus exporter.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct MetricsArgs {
    /// Serve Prometheus metrics over HTTP.
    #[arg(
        long = "metrics.enabled",
        global = true,
        env = "CHAINSCAN_METRICS_ENABLED"
    )]
    pub enabled: bool,
    /// Address the metrics server listens on.
    #[arg(
        long = "metrics.addr",
        global = true,
        default_value = "0.0.0.0",
        env = "CHAINSCAN_METRICS_ADDR"
    )]
    pub addr: IpAddr,
    /// Port the metrics server listens on.
    #[arg(
        long = "metrics.port",
        global = true,
        default_value_t = 9090,
        env = "CHAINSCAN_METRICS_PORT"
    )]
    pub port: u16,
}

impl Default for MetricsArgs {
    fn default() -> Self {
        Self { enabled: false, addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 9090 }
    }
}

impl MetricsArgs {
    /// Starts the exporter if metrics are enabled, returning where it listens.
    pub fn init_metrics(&self) -> Result<Option<SocketAddr>, PrometheusError> {
        if !self.enabled {
            return Ok(None);
        }
        init_prometheus_server(self.addr, self.port).map(Some)
    }
}
