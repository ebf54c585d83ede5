//! Transform execution contract.
//!
//! Gateways may configure request and response transforms whose bodies are
//! opaque blobs in the store; the kernel does not prescribe a scripting
//! language for them.  A [`TransformRunner`] executes those bodies.  When
//! no runner is installed, or a gateway configures no transform, the
//! standard JSON transform in `pathway-gateway` applies.

use crate::config::GatewayConfig;
use crate::value::{Headers, Value};
use async_trait::async_trait;

/// The mutable pieces of an outbound upstream request a request transform
/// may rewrite.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// The target sub-path below the gateway's base URL.
    pub sub_path: String,
}

/// An upstream response as handed to a response transform.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    /// The upstream `Content-Type`, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}

/// Executes opaque transform bodies on behalf of a gateway.
#[async_trait]
pub trait TransformRunner: Send + Sync {
    /// Run a request transform.  The returned parts replace the outbound
    /// method, headers, body, and sub-path.
    async fn run_request(
        &self,
        transform_body: &[u8],
        parts: RequestParts,
    ) -> anyhow::Result<RequestParts>;

    /// Run a response transform.  Its output is the gateway's final value.
    async fn run_response(
        &self,
        transform_body: &[u8],
        response: UpstreamResponse,
        config: &GatewayConfig,
        request_path: &str,
    ) -> anyhow::Result<Value>;
}
