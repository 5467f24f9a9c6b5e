//! Map an [`ExecutionOutcome`] to the client-facing response.

use serde_json::{json, Value};

use crate::evaluator::ExecutionOutcome;

pub const STATUS_OK: u16 = 200;
pub const STATUS_REQUEST_TIMEOUT: u16 = 408;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Final response body and HTTP status for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledResponse {
    pub status: u16,
    pub body: Value,
}

/// Build the response for `outcome`. Every variant has a defined answer.
///
/// Evaluator objects are passed through unchanged apart from the added
/// `duration_ms`, `runner_exit_code` and (when stderr was non-empty)
/// `runner_stderr` fields. The status is 200 only if the evaluator's own
/// `ok` field is boolean `true`.
pub fn assemble(outcome: ExecutionOutcome) -> AssembledResponse {
    match outcome {
        ExecutionOutcome::TimedOut {
            elapsed_ms,
            timeout_sec,
        } => AssembledResponse {
            status: STATUS_REQUEST_TIMEOUT,
            body: json!({
                "ok": false,
                "error": format!("Execution timed out after {timeout_sec} seconds."),
                "duration_ms": elapsed_ms,
            }),
        },
        ExecutionOutcome::EmptyOutput {
            exit_code,
            stderr,
            elapsed_ms,
        } => AssembledResponse {
            status: STATUS_INTERNAL_ERROR,
            body: json!({
                "ok": false,
                "error": "Runner returned empty output.",
                "runner_exit_code": exit_code,
                "runner_stderr": stderr,
                "duration_ms": elapsed_ms,
            }),
        },
        ExecutionOutcome::MalformedOutput {
            exit_code,
            stdout,
            stderr,
            elapsed_ms,
        } => AssembledResponse {
            status: STATUS_INTERNAL_ERROR,
            body: json!({
                "ok": false,
                "error": "Failed to parse runner output as JSON.",
                "runner_exit_code": exit_code,
                "runner_stdout": stdout,
                "runner_stderr": stderr,
                "duration_ms": elapsed_ms,
            }),
        },
        ExecutionOutcome::Completed {
            mut output,
            exit_code,
            stderr,
            elapsed_ms,
        } => {
            let ok = output.get("ok").and_then(Value::as_bool).unwrap_or(false);
            output.insert("duration_ms".to_string(), json!(elapsed_ms));
            output.insert("runner_exit_code".to_string(), json!(exit_code));
            if !stderr.is_empty() {
                output.insert("runner_stderr".to_string(), Value::String(stderr));
            }
            AssembledResponse {
                status: if ok { STATUS_OK } else { STATUS_INTERNAL_ERROR },
                body: Value::Object(output),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
