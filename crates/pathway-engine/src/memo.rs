//! Memoization of pure handler stages.
//!
//! Keys are content-addressed through the store: the (name, args, input)
//! triple is serialized and `put`, and the resulting CID keys the cached
//! outcome.  Identical stages therefore share a key across requests, and
//! the key derivation inherits the store's determinism guarantee.  Only
//! `SideEffect::Pure` handlers are eligible; the engine gates on that.

use parking_lot::RwLock;
use pathway_kernel::{ExecutionContext, Handler, HandlerOutcome, Segment, Value};
use std::collections::HashMap;
use tracing::debug;

/// Cache of pure stage outcomes, keyed by store CID.
#[derive(Default)]
pub struct MemoCache {
    entries: RwLock<HashMap<String, (Value, usize)>>,
}

impl MemoCache {
    /// Invoke `handler` through the cache.  Any failure along the memo
    /// path (serialization, store write) falls back to a plain invoke.
    pub(crate) async fn invoke_memoized(
        &self,
        handler: &dyn Handler,
        name: &str,
        args: &[Segment],
        input: Value,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome> {
        let Ok(key_bytes) = serde_json::to_vec(&(name, args, &input)) else {
            return handler.invoke(args, input, ctx).await;
        };
        let Ok(cid) = ctx.store.put(&key_bytes).await else {
            return handler.invoke(args, input, ctx).await;
        };
        let key = cid.as_str().to_string();

        if let Some((value, consumed)) = self.entries.read().get(&key).cloned() {
            debug!(handler = name, %cid, "memo hit");
            return Ok(HandlerOutcome::new(value, consumed));
        }

        let outcome = handler.invoke(args, input, ctx).await?;
        self.entries
            .write()
            .insert(key, (outcome.value.clone(), outcome.consumed));
        Ok(outcome)
    }
}
