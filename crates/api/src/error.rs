use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use typhon_core::error::CoreError;
use typhon_core::evaluator::EvaluatorError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for request validation, [`EvaluatorError`] for
/// launch failures and [`BytesRejection`] for bodies that could not be read. Implements [`IntoResponse`] to produce the
/// `{ "ok": false, "error": ..., "code": ... }` envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `typhon_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The evaluator process could not be run at all.
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    /// The request body could not be buffered (e.g. over the size limit).
    #[error(transparent)]
    Body(#[from] BytesRejection),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            AppError::Evaluator(err) => {
                tracing::error!(error = %err, "Evaluator could not be run");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EVALUATOR_UNAVAILABLE",
                    err.to_string(),
                )
            }

            AppError::Body(rejection) => {
                let status = rejection.status();
                tracing::info!(%status, error = %rejection, "Rejected request body");
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "BAD_REQUEST"
                };
                (status, code, rejection.body_text())
            }
        };

        let body = json!({
            "ok": false,
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
