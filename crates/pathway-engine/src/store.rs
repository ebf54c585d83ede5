//! In-memory content-addressed store.
//!
//! CIDs are hex-encoded SHA-256 digests, so `put` is deterministic and
//! idempotent by construction.  The entity catalog is seeded up front by
//! the embedding program (admin tooling owns entity lifecycle); `put`s
//! accepted at request time live only as long as the store itself.

use async_trait::async_trait;
use parking_lot::RwLock;
use pathway_kernel::{Cid, EntityKind, Resolved, Store, StoreError, StoreResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// [`Store`] backed by two locked maps: content-addressed blobs and the
/// named-entity catalog.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    entities: RwLock<HashMap<(EntityKind, String), Resolved>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn cid_for(bytes: &[u8]) -> Cid {
        Cid::new(hex::encode(Sha256::digest(bytes)))
    }

    /// Synchronously insert a blob while seeding the catalog.
    pub fn seed_blob(&self, bytes: &[u8]) -> Cid {
        let cid = Self::cid_for(bytes);
        self.blobs
            .write()
            .insert(cid.as_str().to_string(), bytes.to_vec());
        cid
    }

    /// Insert or replace a named entity.
    pub fn insert_entity(&self, kind: EntityKind, name: impl Into<String>, target: Resolved) {
        self.entities.write().insert((kind, name.into()), target);
    }

    /// Remove a named entity, returning whether it existed.
    pub fn remove_entity(&self, kind: EntityKind, name: &str) -> bool {
        self.entities
            .write()
            .remove(&(kind, name.to_string()))
            .is_some()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, bytes: &[u8]) -> StoreResult<Cid> {
        Ok(self.seed_blob(bytes))
    }

    async fn get(&self, cid: &Cid) -> StoreResult<Vec<u8>> {
        self.blobs
            .read()
            .get(cid.as_str())
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(cid.clone()))
    }

    async fn resolve(&self, kind: EntityKind, name: &str) -> StoreResult<Resolved> {
        self.entities
            .read()
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::EntityNotFound {
                kind,
                name: name.to_string(),
            })
    }

    async fn list_by_prefix(&self, prefix: &str) -> StoreResult<Vec<Cid>> {
        let mut cids: Vec<Cid> = self
            .blobs
            .read()
            .keys()
            .filter(|id| id.starts_with(prefix))
            .map(|id| Cid::new(id.clone()))
            .collect();
        cids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(cids)
    }
}
