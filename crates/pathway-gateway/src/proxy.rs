//! Upstream HTTP client with bounded retries.
//!
//! The proxy is intentionally transparent: it forwards the (possibly
//! transformed) method, headers, and body verbatim and hands the raw
//! upstream response back.  Retryable statuses get up to three attempts
//! with exponential backoff; cancellation aborts the in-flight request.

use crate::error::{GatewayImplError, GatewayResult};
use pathway_kernel::{Headers, UpstreamResponse};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Statuses that trigger a retry.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Backoff before the second and later attempts, in seconds.
const BACKOFF_SECS: [u64; 3] = [2, 4, 8];

/// Total attempts per upstream request.
const MAX_ATTEMPTS: usize = 3;

/// Upstream HTTP client for one gateway.  The timeout is per request
/// because it comes from the gateway config resolved at request time.
pub struct UpstreamClient {
    client: Client,
    gateway: String,
}

impl UpstreamClient {
    /// Client for the named gateway.
    pub fn new(gateway: impl Into<String>) -> Self {
        let client = Client::builder()
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            gateway: gateway.into(),
        }
    }

    /// Issue `method url` with the given headers and body, retrying
    /// retryable statuses, racing the request against `cancel`.
    pub async fn fetch(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
        body: &[u8],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> GatewayResult<UpstreamResponse> {
        let mut attempt = 0;
        loop {
            match self
                .fetch_once(method, url, headers, body, timeout, cancel)
                .await
            {
                Ok(response) if RETRY_STATUSES.contains(&response.status) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        debug!(url, status = response.status, "retries exhausted");
                        return Ok(response);
                    }
                    let backoff = BACKOFF_SECS[attempt - 1];
                    warn!(
                        url,
                        status = response.status,
                        attempt,
                        backoff_secs = backoff,
                        "retrying upstream request"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(GatewayImplError::Cancelled),
                        _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
                    }
                }
                other => return other,
            }
        }
    }

    async fn fetch_once(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
        body: &[u8],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> GatewayResult<UpstreamResponse> {
        let mut builder = match method {
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            "HEAD" => self.client.head(url),
            _ => self.client.get(url),
        }
        .timeout(timeout);

        // Forward headers except hop-by-hop ones the client recomputes.
        for (name, value) in headers.iter() {
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name, value);
        }
        if !body.is_empty() {
            builder = builder.body(body.to_vec());
        }

        debug!(method, url, "forwarding to upstream");
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(GatewayImplError::Cancelled),
            result = builder.send() => result.map_err(|e| self.classify(e, timeout))?,
        };

        let status = response.status().as_u16();
        let mut response_headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                response_headers.set(name.as_str(), text);
            }
        }
        let bytes = tokio::select! {
            _ = cancel.cancelled() => return Err(GatewayImplError::Cancelled),
            result = response.bytes() => result.map_err(|e| self.classify(e, timeout))?,
        };

        Ok(UpstreamResponse {
            status,
            headers: response_headers,
            body: bytes.to_vec(),
        })
    }

    fn classify(&self, err: reqwest::Error, timeout: Duration) -> GatewayImplError {
        if err.is_timeout() {
            GatewayImplError::Timeout {
                gateway: self.gateway.clone(),
                seconds: timeout.as_secs(),
            }
        } else {
            GatewayImplError::Network {
                gateway: self.gateway.clone(),
                source: err,
            }
        }
    }
}
