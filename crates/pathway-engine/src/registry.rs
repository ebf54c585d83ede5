//! In-memory [`HandlerRegistry`] implementation.

use parking_lot::RwLock;
use pathway_kernel::{Handler, HandlerRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Registration failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A handler with this name has already been registered.
    #[error("handler '{0}' is already registered")]
    DuplicateHandler(String),
}

/// [`HandlerRegistry`] backed by a locked `HashMap`.
///
/// Suitable for single-process deployments; registration happens at
/// startup, lookups on every dispatch.
#[derive(Default)]
pub struct MemoryRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name.
    pub fn register(&self, handler: Arc<dyn Handler>) -> Result<(), RegistryError> {
        let name = handler.name().to_string();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&name) {
            return Err(RegistryError::DuplicateHandler(name));
        }
        handlers.insert(name, handler);
        Ok(())
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl HandlerRegistry for MemoryRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().get(name).cloned()
    }
}
