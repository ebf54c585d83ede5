//! Engine error kinds and their status mapping.
//!
//! Errors never unwind the execution engine: every failure is converted to
//! an error [`Value`](crate::value::Value) and flows through the pipeline,
//! where only `try/catch` reacts to it.  [`ErrorKind`] is the closed set of
//! failure classes the engine itself can produce; [`EngineError`] is the
//! typed form used internally before the conversion.

use crate::budget::LimitKind;
use crate::store::StoreError;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// ErrorKind
// ─────────────────────────────────────────────────────────────────────────────

/// Failure classes produced by the engine, each with a fixed status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No handler or alias with the requested name.
    NotFound,
    /// Malformed pipeline or missing required handler parameter.
    BadRequest,
    /// A write-class handler was invoked in read-only mode.
    ReadOnlyViolation,
    /// Gateway upstream network failure.
    UpstreamError,
    /// Gateway upstream timeout.
    Timeout,
    /// Budget limit (cost, time, or iterations) hit.
    LimitExceeded,
    /// Operator nesting exceeded the depth guard.
    DepthExceeded,
    /// Alias substitutions exceeded the cycle guard.
    AliasCycle,
    /// Handler failure or engine-internal catch-all.
    Internal,
    /// Client or deadline cancellation.
    Cancelled,
}

impl ErrorKind {
    /// The HTTP-style status code carried by values of this kind.
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::BadRequest => 400,
            ErrorKind::ReadOnlyViolation => 403,
            ErrorKind::UpstreamError => 502,
            ErrorKind::Timeout => 504,
            ErrorKind::LimitExceeded => 429,
            ErrorKind::DepthExceeded => 508,
            ErrorKind::AliasCycle => 508,
            ErrorKind::Internal => 500,
            ErrorKind::Cancelled => 499,
        }
    }

    /// Stable lowercase name, used in the `X-Error-Type` value header.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::ReadOnlyViolation => "read_only_violation",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::LimitExceeded => "limit_exceeded",
            ErrorKind::DepthExceeded => "depth_exceeded",
            ErrorKind::AliasCycle => "alias_cycle",
            ErrorKind::Internal => "internal",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EngineError
// ─────────────────────────────────────────────────────────────────────────────

/// Typed engine failure, converted to an error value at the dispatch
/// boundary via [`EngineError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// No handler or alias with this name.
    #[error("no handler or alias named '{0}'")]
    HandlerNotFound(String),

    /// Alias expansion exceeded the substitution guard.
    #[error("alias expansion exceeded {0} substitutions")]
    AliasCycle(usize),

    /// Operator nesting exceeded the depth guard.
    #[error("operator nesting exceeded depth {0}")]
    DepthExceeded(u32),

    /// A budget limit was hit.
    #[error("budget limit exceeded: {0}")]
    LimitExceeded(LimitKind),

    /// A write-class handler was dispatched in read-only mode.
    #[error("handler '{0}' writes but the request is read-only")]
    ReadOnly(String),

    /// The request was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The store failed to serve a read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A handler returned an error or panicked.
    #[error("handler '{name}' failed: {message}")]
    HandlerFailed { name: String, message: String },
}

impl EngineError {
    /// The [`ErrorKind`] this failure maps to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::HandlerNotFound(_) => ErrorKind::NotFound,
            EngineError::AliasCycle(_) => ErrorKind::AliasCycle,
            EngineError::DepthExceeded(_) => ErrorKind::DepthExceeded,
            EngineError::LimitExceeded(_) => ErrorKind::LimitExceeded,
            EngineError::ReadOnly(_) => ErrorKind::ReadOnlyViolation,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::Store(StoreError::BlobNotFound(_)) => ErrorKind::NotFound,
            EngineError::Store(StoreError::EntityNotFound { .. }) => ErrorKind::NotFound,
            EngineError::Store(StoreError::Backend(_)) => ErrorKind::Internal,
            EngineError::HandlerFailed { .. } => ErrorKind::Internal,
        }
    }
}

impl From<EngineError> for crate::value::Value {
    fn from(err: EngineError) -> Self {
        crate::value::Value::error(err.kind(), err.to_string())
    }
}
