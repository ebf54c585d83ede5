//! Content-addressed store contract.
//!
//! The engine sees persistence only through the [`Store`] trait:
//! content-addressed blobs identified by [`Cid`] plus named-entity lookup.
//! Blobs are immutable; `put` is idempotent (identical bytes yield the
//! identical CID).  Concrete backends (in-memory, relational, file system)
//! live outside the kernel; `pathway-engine` ships the in-memory one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Cid
// ─────────────────────────────────────────────────────────────────────────────

/// Content IDentifier: an opaque string derived deterministically from the
/// bytes of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    /// Wrap an identifier produced by a store.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Named entities
// ─────────────────────────────────────────────────────────────────────────────

/// The kinds of named entities a store can resolve.
///
/// Names are globally unique per kind.  Entities are created and updated by
/// external admin tooling; the engine only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Server,
    Alias,
    Variable,
    Secret,
    Gateway,
    Template,
    Transform,
}

impl EntityKind {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Server => "server",
            EntityKind::Alias => "alias",
            EntityKind::Variable => "variable",
            EntityKind::Secret => "secret",
            EntityKind::Gateway => "gateway",
            EntityKind::Template => "template",
            EntityKind::Transform => "transform",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The target a named entity resolves to: a stored blob or an inline
/// string (variables and secrets carry their value directly).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolved {
    Blob(Cid),
    Inline(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Store failure.  All variants are recoverable from the engine's point of
/// view: a failed read becomes an error value, never a panic.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No blob with this CID.
    #[error("blob '{0}' not found")]
    BlobNotFound(Cid),

    /// No entity of this kind with this name.
    #[error("no {kind} named '{name}'")]
    EntityNotFound { kind: EntityKind, name: String },

    /// The backend itself failed (connection, corruption, ...).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Store trait
// ─────────────────────────────────────────────────────────────────────────────

/// Kernel contract for content-addressed storage and named-entity lookup.
///
/// Implementations must guarantee blob immutability.  A store running in
/// an in-memory mode may serve reads from a pre-populated catalog while
/// accepting new `put`s that live only for the request's lifetime.
#[async_trait]
pub trait Store: Send + Sync {
    /// Store a blob and return its CID.  Deterministic: identical bytes
    /// yield the identical CID.
    async fn put(&self, bytes: &[u8]) -> StoreResult<Cid>;

    /// Read a blob by CID.
    async fn get(&self, cid: &Cid) -> StoreResult<Vec<u8>>;

    /// Resolve a named entity to a blob CID or an inline string.
    async fn resolve(&self, kind: EntityKind, name: &str) -> StoreResult<Resolved>;

    /// List the CIDs whose identifier starts with `prefix`.
    async fn list_by_prefix(&self, prefix: &str) -> StoreResult<Vec<Cid>>;
}
