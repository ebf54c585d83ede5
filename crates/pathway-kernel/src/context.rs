//! Request-scoped execution context.
//!
//! An [`ExecutionContext`] is threaded through every stage in place of
//! ambient state: the original request, the budget account, the store and
//! registry handles, the operator-nesting depth, and the cancellation
//! signal all travel together.

use crate::budget::BudgetAccount;
use crate::handler::HandlerRegistry;
use crate::store::Store;
use crate::value::Headers;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Maximum operator-nesting depth before dispatch yields a 508 value.
pub const MAX_DEPTH: u32 = 32;

// ─────────────────────────────────────────────────────────────────────────────
// RequestInfo
// ─────────────────────────────────────────────────────────────────────────────

/// The original client request as delivered by the front-end.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// HTTP method (`GET` when the front-end assumed it).
    pub method: String,
    /// Raw request path including the leading `/`.
    pub path: String,
    /// Query string without the `?`, preserved verbatim across stages.
    pub query: String,
    /// Request headers.
    pub headers: Headers,
    /// Request body bytes.
    pub body: Vec<u8>,
}

impl RequestInfo {
    /// A GET request for the given path with no query, headers, or body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Builder: set the query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Builder: set a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ExecutionContext
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a stage needs, passed explicitly: no globals, no session
/// state.  Cloning is cheap (`Arc` handles plus the request view); child
/// contexts share the budget and cancellation signal of their parent.
#[derive(Clone)]
pub struct ExecutionContext {
    /// The original request.
    pub request: RequestInfo,
    /// Shared per-request budget account.
    pub budget: Arc<BudgetAccount>,
    /// Write-class handlers are rejected when set.
    pub read_only: bool,
    /// Content-addressed store handle.
    pub store: Arc<dyn Store>,
    /// Handler registry handle.
    pub registry: Arc<dyn HandlerRegistry>,
    /// Operator-nesting depth; incremented on every operator descent.
    pub depth: u32,
    /// Request-scoped cancellation signal.
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    /// Root context for a fresh request with default budget limits.
    pub fn new(
        request: RequestInfo,
        store: Arc<dyn Store>,
        registry: Arc<dyn HandlerRegistry>,
    ) -> Self {
        Self {
            request,
            budget: Arc::new(BudgetAccount::default()),
            read_only: false,
            store,
            registry,
            depth: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Builder: replace the budget account.
    pub fn with_budget(mut self, budget: Arc<BudgetAccount>) -> Self {
        self.budget = budget;
        self
    }

    /// Builder: set read-only mode.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Builder: attach an external cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Child context for an operator descent: depth + 1, everything else
    /// shared.
    pub fn child(&self) -> Self {
        let mut child = self.clone();
        child.depth += 1;
        child
    }

    /// Whether the depth guard is exceeded.
    pub fn depth_exceeded(&self) -> bool {
        self.depth > MAX_DEPTH
    }

    /// Child context for a catch-path, carrying the error description in
    /// the request headers where the catch stages can read it.
    pub fn with_error_headers(&self, message: &str, status: u16, error_type: &str) -> Self {
        let mut child = self.child();
        child.request.headers.set("X-Error-Message", message);
        child.request.headers.set("X-Error-Status", status.to_string());
        child.request.headers.set("X-Error-Type", error_type);
        child
    }

    /// Whether the request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
