//! Handler for `POST /api/run`.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{Map, Value};
use typhon_core::assemble::assemble;
use typhon_core::request::normalize;

use crate::error::AppResult;
use crate::state::AppState;

/// POST /api/run
///
/// Normalize the client request, run the evaluator once under its timeout
/// and answer with the assembled body and status. Validation failures are
/// answered with 400 before any process is started, and a body over the
/// configured limit with a JSON 413.
pub async fn run_evaluation(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let raw = client_fields(&body?);

    let request = normalize(&raw).inspect_err(|e| {
        tracing::info!(error = %e.message(), "Rejected run request");
    })?;

    let outcome = state.evaluator.execute(&request).await?;

    tracing::info!(
        mode = %request.mode,
        timeout_sec = request.timeout_sec,
        outcome = outcome.kind(),
        elapsed_ms = outcome.elapsed_ms(),
        "Evaluator run finished"
    );

    let response = assemble(outcome);
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(response.body)))
}

/// Decode the request body leniently.
///
/// Anything that is not a JSON object (empty body, invalid JSON, arrays,
/// scalars) is treated as an object with no fields.
fn client_fields(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
