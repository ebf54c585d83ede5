//! The test handler kit.
//!
//! Small deterministic handlers standing in for production ones, so
//! pipeline behavior can be exercised end to end without external
//! services.

use async_trait::async_trait;
use pathway_engine::{Engine, MemoryRegistry};
use pathway_kernel::{
    ExecutionContext, Handler, HandlerOutcome, Segment, SideEffect, Value,
};
use std::sync::Arc;

/// Joins its arguments with `/` and returns them as plain text.
pub struct Echo;

#[async_trait]
impl Handler for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Pure
    }

    async fn invoke(
        &self,
        args: &[Segment],
        _input: Value,
        _ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome> {
        let joined = args
            .iter()
            .map(|segment| segment.as_str())
            .collect::<Vec<_>>()
            .join("/");
        Ok(HandlerOutcome::consuming_all(Value::text(joined), args))
    }
}

/// Evaluates the remaining pipeline and uppercases the resulting body.
pub struct Upper;

#[async_trait]
impl Handler for Upper {
    fn name(&self) -> &str {
        "upper"
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Reads
    }

    async fn invoke(
        &self,
        args: &[Segment],
        input: Value,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome> {
        let mut value = if args.is_empty() {
            input
        } else {
            Engine::new().execute(args, input, ctx).await
        };
        if let Some(text) = value.output_utf8() {
            value.output = text.to_uppercase().into_bytes();
        }
        Ok(HandlerOutcome::consuming_all(value, args))
    }
}

/// Always fails, for try/catch and error-propagation tests.
pub struct Fail;

#[async_trait]
impl Handler for Fail {
    fn name(&self) -> &str {
        "fail"
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Pure
    }

    async fn invoke(
        &self,
        _args: &[Segment],
        _input: Value,
        _ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome> {
        anyhow::bail!("deliberate failure")
    }
}

/// Cost estimator answering a fixed amount of cents per stage.
pub struct FixedCost(pub &'static str);

#[async_trait]
impl Handler for FixedCost {
    fn name(&self) -> &str {
        pathway_engine::COST_ESTIMATOR
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Pure
    }

    async fn invoke(
        &self,
        _args: &[Segment],
        _input: Value,
        _ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome> {
        Ok(HandlerOutcome::chaining(Value::text(self.0)))
    }
}

/// Registry with the whole kit except the cost estimator.
pub fn test_registry() -> Arc<MemoryRegistry> {
    let registry = MemoryRegistry::new();
    registry.register(Arc::new(Echo)).expect("fresh registry");
    registry.register(Arc::new(Upper)).expect("fresh registry");
    registry.register(Arc::new(Fail)).expect("fresh registry");
    Arc::new(registry)
}
