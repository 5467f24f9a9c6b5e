use std::sync::Arc;

use typhon_core::evaluator::EvaluatorClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; nothing in here is mutated per request.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Launches one evaluator process per `/api/run` call.
    pub evaluator: Arc<EvaluatorClient>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let evaluator = Arc::new(EvaluatorClient::new(config.evaluator.clone()));
        Self {
            config: Arc::new(config),
            evaluator,
        }
    }
}
