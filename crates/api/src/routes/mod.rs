pub mod health;
pub mod run;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /health                                          service health (GET)
/// /run                                             normalize + evaluate (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(run::router())
}
