use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Service name reported to UI clients.
    pub service: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: "typhon-webui",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Mount health check routes (under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
