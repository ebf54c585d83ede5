//! Gateway runtime error types.
//!
//! Definition-time failures (bad config JSON, invalid patterns) live in
//! `pathway-kernel`; the variants here cover runtime failures around the
//! upstream request.  Each maps to an error value so a gateway stage never
//! unwinds the pipeline.

use pathway_kernel::{ErrorKind, Value};
use thiserror::Error;

/// Runtime gateway failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayImplError {
    /// The upstream could not be reached.
    #[error("gateway '{gateway}' upstream request failed: {source}")]
    Network {
        gateway: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream did not answer within the configured timeout.
    #[error("gateway '{gateway}' upstream timed out after {seconds}s")]
    Timeout { gateway: String, seconds: u64 },

    /// The request was cancelled while the upstream call was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// The gateway's stored configuration could not be loaded.
    #[error("gateway '{gateway}' configuration: {message}")]
    Config { gateway: String, message: String },
}

pub type GatewayResult<T> = Result<T, GatewayImplError>;

impl GatewayImplError {
    /// The error-value kind this failure maps to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayImplError::Network { .. } => ErrorKind::UpstreamError,
            GatewayImplError::Timeout { .. } => ErrorKind::Timeout,
            GatewayImplError::Cancelled => ErrorKind::Cancelled,
            GatewayImplError::Config { .. } => ErrorKind::Internal,
        }
    }
}

impl From<GatewayImplError> for Value {
    fn from(err: GatewayImplError) -> Self {
        Value::error(err.kind(), err.to_string())
    }
}
