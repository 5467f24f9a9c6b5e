use std::path::PathBuf;

use typhon_core::evaluator::EvaluatorConfig;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Kept above the longest evaluator
    /// budget so the supervisor's own 408 reaches the client.
    pub request_timeout_secs: u64,
    /// Largest accepted `POST /api/run` body in bytes.
    pub max_body_bytes: usize,
    /// How to launch the evaluator process.
    pub evaluator: EvaluatorConfig,
    /// `LOG_FORMAT=json` switches the subscriber to JSON lines.
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `HOST`                 | `127.0.0.1`              |
    /// | `PORT`                 | `5000`                   |
    /// | `CORS_ORIGINS`         | `http://localhost:5000`  |
    /// | `REQUEST_TIMEOUT_SECS` | `630`                    |
    /// | `MAX_BODY_BYTES`       | `10485760` (10 MiB)      |
    /// | `EVALUATOR_PROGRAM`    | `python3`                |
    /// | `EVALUATOR_ARGS`       | `webui/runner.py`        |
    /// | `PROJECT_ROOT`         | `.`                      |
    /// | `LOG_FORMAT`           | `text`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "127.0.0.1");

        let port_raw = var("PORT", "5000");
        let port: u16 = port_raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name: "PORT",
            expected: "u16",
            value: port_raw.clone(),
        })?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let timeout_raw = var("REQUEST_TIMEOUT_SECS", "630");
        let request_timeout_secs: u64 =
            timeout_raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_SECS",
                expected: "u64",
                value: timeout_raw.clone(),
            })?;

        let body_raw = var("MAX_BODY_BYTES", "10485760");
        let max_body_bytes: usize = body_raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name: "MAX_BODY_BYTES",
            expected: "usize",
            value: body_raw.clone(),
        })?;

        let evaluator = EvaluatorConfig {
            program: var("EVALUATOR_PROGRAM", "python3"),
            args: var("EVALUATOR_ARGS", "webui/runner.py")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            working_directory: PathBuf::from(var("PROJECT_ROOT", ".")),
        };

        let format_raw = var("LOG_FORMAT", "text");
        let log_format = match format_raw.trim().to_lowercase().as_str() {
            "text" | "" => LogFormat::Text,
            "json" => LogFormat::Json,
            _ => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    expected: "log format (text|json)",
                    value: format_raw,
                })
            }
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_body_bytes,
            evaluator,
            log_format,
        })
    }
}
