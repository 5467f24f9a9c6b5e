//! Route definitions for evaluator runs.

use axum::routing::post;
use axum::Router;

use crate::handlers::run;
use crate::state::AppState;

/// ```text
/// POST   /run                       -> run_evaluation
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/run", post(run::run_evaluation))
}
