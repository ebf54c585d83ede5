//! Handler contract and registry.
//!
//! A handler is a named unit of computation consuming zero or more pipeline
//! segments.  The engine looks handlers up by name through a
//! [`HandlerRegistry`] and invokes them with a uniform contract; handler
//! bodies are opaque to the kernel.

use crate::context::ExecutionContext;
use crate::path::Segment;
use crate::value::Value;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Side effects
// ─────────────────────────────────────────────────────────────────────────────

/// Declared side-effect class of a handler.
///
/// The engine rejects `Writes` handlers with a 403 error value when the
/// request runs in read-only mode; `Pure` handlers are eligible for
/// store-backed memoization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideEffect {
    /// Output depends only on the inputs.
    Pure,
    /// Reads shared state (store, variables) but mutates nothing.
    Reads,
    /// Mutates shared state.
    Writes,
    /// Talks to the outside world (gateways, upstream APIs).
    External,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler trait
// ─────────────────────────────────────────────────────────────────────────────

/// The result of one handler invocation: the produced value plus how many
/// of the offered segments the handler consumed.  The engine continues the
/// pipeline with the unconsumed remainder.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub value: Value,
    pub consumed: usize,
}

impl HandlerOutcome {
    /// Outcome that consumed an explicit number of segments.
    pub fn new(value: Value, consumed: usize) -> Self {
        Self { value, consumed }
    }

    /// Outcome that consumed every offered segment.
    pub fn consuming_all(value: Value, offered: &[Segment]) -> Self {
        Self {
            value,
            consumed: offered.len(),
        }
    }

    /// Outcome that consumed nothing and chains straight to the next stage.
    pub fn chaining(value: Value) -> Self {
        Self { value, consumed: 0 }
    }
}

/// Kernel contract for a named unit of computation.
///
/// Handlers run synchronously from the engine's perspective: `invoke` is
/// awaited to completion before the next stage starts.  A handler error is
/// caught at the engine boundary and converted to a 500-status value; it
/// never unwinds the pipeline.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Registry name of this handler.
    fn name(&self) -> &str;

    /// Declared side-effect class.
    fn side_effect(&self) -> SideEffect;

    /// Execute against the remaining pipeline segments.
    ///
    /// `args` is everything after the handler's own name; the outcome
    /// reports how many of those segments were consumed (often all, zero
    /// for handlers that transform their input and chain).
    async fn invoke(
        &self,
        args: &[Segment],
        input: Value,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry trait
// ─────────────────────────────────────────────────────────────────────────────

/// Kernel contract for handler lookup.
///
/// Registries are read-mostly: registration happens out-of-band, lookups
/// happen on every dispatch.
pub trait HandlerRegistry: Send + Sync {
    /// Look up a handler by name.  Returns `None` if not registered.
    fn lookup(&self, name: &str) -> Option<Arc<dyn Handler>>;
}
