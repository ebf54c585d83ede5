//! Control-flow operators: `if/then/else`, `do/while`, `try/catch`.
//!
//! Each operator receives the entire pipeline remainder after its head
//! segment and a child context (depth already incremented by the engine).
//! All three support the identity form: an operator whose parser finds no
//! terminator simply hands its segments back to the engine.

pub mod attempt;
pub mod cond;
pub mod loops;

use crate::engine::Engine;
use pathway_kernel::{ExecutionContext, Segment, Value};

/// Execute one operator sub-path.  An empty argument path evaluates to the
/// empty value rather than passing the input through.
pub(crate) async fn run_part(
    engine: &Engine,
    path: &[Segment],
    input: Value,
    ctx: &ExecutionContext,
) -> Value {
    if path.is_empty() {
        Value::empty()
    } else {
        engine.execute(path, input, ctx).await
    }
}
