use alloy_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// An error returned by a [`crate::ChainProvider`].
#[derive(Error, Debug)]
pub enum RpcError {
    /// The request could not be sent or the node answered with an error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The node did not answer within the configured timeout.
    #[error("`{method}` timed out after {timeout:?}")]
    Timeout {
        /// The RPC method that timed out.
        method: &'static str,
        /// The configured request timeout.
        timeout: Duration,
    },
}
