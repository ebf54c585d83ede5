//! The `try/catch` operator.

use super::run_part;
use crate::engine::Engine;
use crate::parser::{parse_try, TryParts};
use pathway_kernel::{ErrorKind, ExecutionContext, Segment, Value};

/// Maximum bytes of the failing body carried into `X-Error-Message`.
const ERROR_MESSAGE_LIMIT: usize = 500;

/// Execute the try path; when its value is an error and a catch path
/// exists, execute the catch path in a child context whose request
/// headers describe the error.  A catch-path error propagates as-is.
pub async fn run(
    engine: &Engine,
    segments: &[Segment],
    input: Value,
    ctx: &ExecutionContext,
) -> Value {
    let (try_path, catch_path) = match parse_try(segments) {
        TryParts::Identity(path) => return run_part(engine, path, input, ctx).await,
        TryParts::Guarded {
            try_path,
            catch_path,
        } => (try_path, catch_path),
    };

    let attempted = run_part(engine, try_path, input.clone(), ctx).await;
    if !attempted.is_error() {
        return attempted;
    }

    let message = truncated_message(&attempted);
    let status = attempted.status_code;
    // Handler failures the engine caught read as exceptions; everything
    // else surfaced through a status code.
    let error_type = if attempted.headers.get("X-Error-Type") == Some(ErrorKind::Internal.as_str())
    {
        "exception"
    } else {
        "status"
    };

    let catch_ctx = ctx.with_error_headers(&message, status, error_type);
    run_part(engine, catch_path, input, &catch_ctx).await
}

fn truncated_message(value: &Value) -> String {
    let cut = value.output.len().min(ERROR_MESSAGE_LIMIT);
    String::from_utf8_lossy(&value.output[..cut]).into_owned()
}
