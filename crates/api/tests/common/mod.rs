#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use typhon_api::config::{LogFormat, ServerConfig};
use typhon_api::router::build_app_router;
use typhon_api::state::AppState;
use typhon_core::evaluator::EvaluatorConfig;

/// Build a test `ServerConfig` whose evaluator is `sh <script>`.
///
/// Uses `http://localhost:5000` as CORS origin (matching the dev default)
/// a 30-second request timeout and a 64 KiB body limit.
pub fn test_config(script: &tempfile::NamedTempFile) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5000".to_string()],
        request_timeout_secs: 30,
        max_body_bytes: 64 * 1024,
        evaluator: EvaluatorConfig {
            program: "sh".to_string(),
            args: vec![script.path().to_str().expect("path").to_string()],
            working_directory: std::env::temp_dir(),
        },
        log_format: LogFormat::Text,
    }
}

/// Build the full application router, exactly as `main.rs` does.
pub fn build_test_app(config: ServerConfig) -> Router {
    let state = AppState::new(config.clone());
    build_app_router(state, &config)
}

/// Router backed by an evaluator script with the given shell body.
///
/// The returned temp file must outlive the router.
pub fn app_with_evaluator(body: &str) -> (Router, tempfile::NamedTempFile) {
    let script = write_evaluator_script(body);
    let app = build_test_app(test_config(&script));
    (app, script)
}

/// Router whose evaluator program does not exist.
pub fn app_without_evaluator() -> Router {
    let script = write_evaluator_script("");
    let mut config = test_config(&script);
    config.evaluator.program = "/nonexistent/typhon-evaluator".to_string();
    config.evaluator.working_directory = PathBuf::from("/");
    build_test_app(config)
}

/// Write a `/bin/sh` script standing in for the evaluator.
pub fn write_evaluator_script(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(".sh")
        .tempfile()
        .expect("create temp file");
    write!(f, "{body}").expect("write body");
    f
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
