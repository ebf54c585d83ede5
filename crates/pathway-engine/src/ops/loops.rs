//! The `do/while` operator.

use super::run_part;
use crate::engine::Engine;
use crate::parser::{parse_do, DoParts};
use pathway_kernel::{
    EntityKind, ErrorKind, ExecutionContext, Resolved, Segment, Value,
};
use tracing::debug;

/// Header set when a loop terminates on a budget limit rather than a
/// falsy test.
pub const LOOP_TERMINATED_HEADER: &str = "X-Loop-Terminated";

/// The variable read by the implicit test when `while` has no test path.
pub const IMPLICIT_WHILE_VARIABLE: &str = "max_do_while";

/// Run the body, append its output to the accumulator, and repeat while
/// the test is truthy and no limit trips.  Byte-level concatenation; the
/// final content type is the last iteration's.  Limit exits stamp
/// `X-Loop-Terminated` with the triggering kind.
pub async fn run(
    engine: &Engine,
    segments: &[Segment],
    input: Value,
    ctx: &ExecutionContext,
) -> Value {
    let (body, test) = match parse_do(segments) {
        DoParts::Identity(path) => return run_part(engine, path, input, ctx).await,
        DoParts::Loop { body, test } => (body, test),
    };

    let limits = *ctx.budget.limits();
    let mut accumulated = Value::empty();
    let mut iterations: u32 = 0;

    loop {
        // Cancellation is honored at the top of each iteration.
        if ctx.is_cancelled() {
            return Value::error(ErrorKind::Cancelled, "request cancelled");
        }
        if let Err(kind) = ctx.budget.charge(0.0, Some(iterations)) {
            accumulated
                .headers
                .set(LOOP_TERMINATED_HEADER, kind.as_str());
            break;
        }

        let body_value = run_part(engine, body, input.clone(), ctx).await;
        accumulated.output.extend_from_slice(&body_value.output);
        accumulated.content_type = body_value.content_type;
        iterations += 1;

        if iterations >= limits.max_loop_iterations {
            accumulated.headers.set(LOOP_TERMINATED_HEADER, "iterations");
            break;
        }
        if ctx.budget.elapsed_ms() >= limits.max_elapsed_ms {
            accumulated.headers.set(LOOP_TERMINATED_HEADER, "time");
            break;
        }
        if ctx.budget.cost_cents() >= limits.max_cost_cents {
            accumulated.headers.set(LOOP_TERMINATED_HEADER, "cost");
            break;
        }

        let probe = match test {
            Some(test_path) => run_part(engine, test_path, input.clone(), ctx).await,
            None => implicit_test(ctx).await,
        };
        // A limit tripped by the test stage itself still terminates the
        // loop with the header, not as a silent falsy probe.
        if let Err(kind) = ctx.budget.check() {
            accumulated
                .headers
                .set(LOOP_TERMINATED_HEADER, kind.as_str());
            break;
        }
        if probe.is_falsy() {
            debug!(iterations, "loop test went falsy");
            break;
        }
    }

    accumulated
}

/// The implicit test: read the `max_do_while` variable (re-resolved every
/// iteration, never mutated) and evaluate it for truthiness.  A failed
/// resolve is an error value, which is falsy.
async fn implicit_test(ctx: &ExecutionContext) -> Value {
    match ctx
        .store
        .resolve(EntityKind::Variable, IMPLICIT_WHILE_VARIABLE)
        .await
    {
        Ok(Resolved::Inline(text)) => Value::text(text),
        Ok(Resolved::Blob(cid)) => match ctx.store.get(&cid).await {
            Ok(bytes) => Value {
                output: bytes,
                ..Value::empty()
            },
            Err(err) => pathway_kernel::EngineError::Store(err).into(),
        },
        Err(err) => pathway_kernel::EngineError::Store(err).into(),
    }
}
