//! The `if/then/else` operator.

use super::run_part;
use crate::engine::Engine;
use crate::parser::{parse_if, IfParts};
use pathway_kernel::{ExecutionContext, Segment, Value};

/// Evaluate the test path; run the true path when truthy, the false path
/// when falsy, and return the probe value itself when no false path
/// exists.  Content type, headers, and status come from whichever branch
/// actually ran.
pub async fn run(
    engine: &Engine,
    segments: &[Segment],
    input: Value,
    ctx: &ExecutionContext,
) -> Value {
    match parse_if(segments) {
        IfParts::Identity(path) => run_part(engine, path, input, ctx).await,
        IfParts::Branches {
            test,
            true_path,
            false_path,
        } => {
            let probe = run_part(engine, test, input.clone(), ctx).await;
            if probe.is_truthy() {
                run_part(engine, true_path, input, ctx).await
            } else if let Some(false_path) = false_path {
                run_part(engine, false_path, input, ctx).await
            } else {
                // Callers observe the falsy probe value directly.
                probe
            }
        }
    }
}
