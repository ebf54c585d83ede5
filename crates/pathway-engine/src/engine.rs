//! The pipeline execution engine.
//!
//! [`Engine::execute`] reduces a segment sequence to a [`Value`]: operator
//! heads hand the entire remainder to the matching operator, other
//! segments dispatch through the handler registry, unknown names fall back
//! to alias expansion, and anything else is a 404 value.  Failures never
//! unwind; they become error values and flow back through the pipeline.

use crate::memo::MemoCache;
use crate::ops;
use crate::parser::{self, KW_DO, KW_IF, KW_TRY};
use futures::future::BoxFuture;
use futures::FutureExt;
use pathway_kernel::{
    EngineError, EntityKind, ErrorKind, ExecutionContext, Resolved, Segment, SideEffect, Value,
};
use tracing::{debug, instrument, warn};

/// Maximum alias substitutions per dispatch before a 508 value.
pub const MAX_ALIAS_SUBSTITUTIONS: usize = 16;

/// Registry name of the pluggable cost estimator.  The engine treats its
/// output as decimal cents and charges the budget account after every
/// ordinary handler stage.
pub const COST_ESTIMATOR: &str = "cost_estimate";

/// Engine tunables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Memoize `Pure` handler stages through the store (off by default so
    /// handler tests observe every call).
    pub memoize_pure: bool,
}

/// The execution engine.  Stateless apart from the memo cache; all
/// request state travels in the [`ExecutionContext`].
#[derive(Default)]
pub struct Engine {
    options: EngineOptions,
    memo: MemoCache,
}

impl Engine {
    /// Engine with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with explicit options.
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            options,
            memo: MemoCache::default(),
        }
    }

    /// Reduce a full request to a value: parse the request path and
    /// execute the resulting pipeline against an empty input.
    #[instrument(skip(self, ctx), fields(path = %ctx.request.path))]
    pub async fn handle(&self, ctx: &ExecutionContext) -> Value {
        let pipeline = parser::parse_path(&ctx.request.path);
        debug!(segments = pipeline.len(), "dispatching pipeline");
        self.execute(pipeline.segments(), Value::empty(), ctx).await
    }

    /// Reduce a segment sequence to a value, starting from `input`.
    ///
    /// Boxed because the control-flow operators recurse back into the
    /// engine for their sub-paths.
    pub fn execute<'a>(
        &'a self,
        segments: &'a [Segment],
        input: Value,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Value> {
        self.execute_inner(segments, input, ctx).boxed()
    }

    async fn execute_inner(
        &self,
        segments: &[Segment],
        mut input: Value,
        ctx: &ExecutionContext,
    ) -> Value {
        let mut segments: Vec<Segment> = segments.to_vec();
        let mut substitutions = 0usize;

        loop {
            if ctx.is_cancelled() {
                return Value::error(ErrorKind::Cancelled, "request cancelled");
            }
            if let Err(kind) = ctx.budget.check() {
                return EngineError::LimitExceeded(kind).into();
            }

            let Some(head) = segments.first().cloned() else {
                return input;
            };

            // Operator heads take the entire remainder.
            if parser::is_operator_head(&head) {
                let child = ctx.child();
                if child.depth_exceeded() {
                    return EngineError::DepthExceeded(child.depth).into();
                }
                let rest = &segments[1..];
                return match head.as_str() {
                    KW_IF => ops::cond::run(self, rest, input, &child).await,
                    KW_DO => ops::loops::run(self, rest, input, &child).await,
                    KW_TRY => ops::attempt::run(self, rest, input, &child).await,
                    _ => unreachable!("is_operator_head covers all heads"),
                };
            }

            let name = head.as_str();
            if let Some(handler) = ctx.registry.lookup(name) {
                if ctx.read_only && handler.side_effect() == SideEffect::Writes {
                    return EngineError::ReadOnly(name.to_string()).into();
                }

                let args = &segments[1..];
                let outcome = if self.options.memoize_pure
                    && handler.side_effect() == SideEffect::Pure
                {
                    self.memo
                        .invoke_memoized(handler.as_ref(), name, args, input, ctx)
                        .await
                } else {
                    handler.invoke(args, input, ctx).await
                };

                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(handler = name, error = %err, "handler failed");
                        return EngineError::HandlerFailed {
                            name: name.to_string(),
                            message: err.to_string(),
                        }
                        .into();
                    }
                };

                let consumed = outcome.consumed.min(args.len());
                input = outcome.value;

                if name != COST_ESTIMATOR {
                    if let Err(kind) = self.charge_estimated_cost(name, &input, ctx).await {
                        return EngineError::LimitExceeded(kind).into();
                    }
                }

                segments = args[consumed..].to_vec();
                continue;
            }

            // Unknown name: try alias expansion, spliced in place.
            match ctx.store.resolve(EntityKind::Alias, name).await {
                Ok(resolved) => {
                    substitutions += 1;
                    if substitutions > MAX_ALIAS_SUBSTITUTIONS {
                        return EngineError::AliasCycle(MAX_ALIAS_SUBSTITUTIONS).into();
                    }
                    let expansion = match resolved {
                        Resolved::Inline(text) => text,
                        Resolved::Blob(cid) => match ctx.store.get(&cid).await {
                            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                            Err(err) => return EngineError::Store(err).into(),
                        },
                    };
                    debug!(alias = name, expansion = %expansion, "substituting alias");
                    let mut next = parser::parse_path(&expansion).segments().to_vec();
                    next.extend_from_slice(&segments[1..]);
                    segments = next;
                }
                Err(pathway_kernel::StoreError::EntityNotFound { .. }) => {
                    return EngineError::HandlerNotFound(name.to_string()).into();
                }
                Err(err) => return EngineError::Store(err).into(),
            }
        }
    }

    /// Ask the pluggable cost estimator to price the stage that just
    /// produced `value`, and charge the account.  Estimator absence or
    /// unparseable output charges nothing.
    async fn charge_estimated_cost(
        &self,
        stage: &str,
        value: &Value,
        ctx: &ExecutionContext,
    ) -> Result<(), pathway_kernel::LimitKind> {
        let Some(estimator) = ctx.registry.lookup(COST_ESTIMATOR) else {
            return Ok(());
        };
        let estimate = match estimator.invoke(&[], value.clone(), ctx).await {
            Ok(outcome) => outcome.value,
            Err(err) => {
                warn!(stage, error = %err, "cost estimator failed; charging nothing");
                return Ok(());
            }
        };
        let Some(cents) = estimate
            .output_utf8()
            .and_then(|text| text.trim().parse::<f64>().ok())
        else {
            return Ok(());
        };
        ctx.budget.charge(cents, None)
    }
}
