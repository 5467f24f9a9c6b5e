//! Canonical execution request and the normalizer that builds it.
//!
//! [`normalize`] is the single fallible checkpoint between raw client JSON
//! and the evaluator. Every field not covered by an explicit rule below is
//! defaulted through [`crate::coercion`] and never rejected.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coercion::{parse_list, parse_scope, to_bool, to_int, to_text};
use crate::error::CoreError;

/// Default values for every optional request field.
pub mod defaults {
    pub const TIMEOUT_SEC: i64 = 90;
    pub const MIN_TIMEOUT_SEC: i64 = 5;
    pub const MAX_TIMEOUT_SEC: i64 = 600;

    pub const RCE_METHOD: &str = "exec";
    pub const IS_ALLOW_EXCEPTION_LEAK: bool = true;

    pub const ALLOW_UNICODE_BYPASS: bool = false;
    pub const PRINT_ALL_PAYLOAD: bool = false;
    pub const INTERACTIVE: bool = true;
    pub const DEPTH: i64 = 5;
    pub const RECURSION_LIMIT: i64 = 200;
}

/// What the evaluator is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Evaluate `cmd`.
    Rce,
    /// Read `filepath` using `rce_method`.
    Read,
}

impl Mode {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rce" => Some(Self::Rce),
            "read" => Some(Self::Read),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rce => "rce",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluator verbosity. Unknown spellings collapse to [`LogLevel::Info`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Quiet,
}

impl LogLevel {
    fn from_client(value: Option<&Value>) -> Self {
        match value.map(to_text).unwrap_or_default().trim().to_uppercase().as_str() {
            "DEBUG" => Self::Debug,
            "QUIET" => Self::Quiet,
            _ => Self::Info,
        }
    }
}

/// Evaluator tuning knobs, nested under `options` in the evaluator payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    pub local_scope: Option<Map<String, Value>>,
    pub banned_chr: Vec<String>,
    pub allowed_chr: Vec<String>,
    pub banned_ast: Vec<String>,
    pub banned_re: Vec<String>,
    /// `None` means no length limit.
    pub max_length: Option<i64>,
    pub allow_unicode_bypass: bool,
    pub print_all_payload: bool,
    pub interactive: bool,
    pub depth: i64,
    pub recursion_limit: i64,
    pub log_level: LogLevel,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            local_scope: None,
            banned_chr: Vec::new(),
            allowed_chr: Vec::new(),
            banned_ast: Vec::new(),
            banned_re: Vec::new(),
            max_length: None,
            allow_unicode_bypass: defaults::ALLOW_UNICODE_BYPASS,
            print_all_payload: defaults::PRINT_ALL_PAYLOAD,
            interactive: defaults::INTERACTIVE,
            depth: defaults::DEPTH,
            recursion_limit: defaults::RECURSION_LIMIT,
            log_level: LogLevel::Info,
        }
    }
}

/// The canonical, bounded request handed to the evaluator.
///
/// Serializing this type yields exactly the evaluator payload: `timeout_sec`
/// is enforced by the supervisor and never leaves the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRequest {
    pub mode: Mode,
    pub cmd: String,
    pub filepath: String,
    /// Lowercased. Guaranteed to be `exec` or `eval` only in read mode.
    pub rce_method: String,
    pub is_allow_exception_leak: bool,
    pub options: ExecutionOptions,
    /// Wall-clock budget in seconds, always within
    /// [`defaults::MIN_TIMEOUT_SEC`]..=[`defaults::MAX_TIMEOUT_SEC`].
    #[serde(skip_serializing)]
    pub timeout_sec: u64,
}

impl ExecutionRequest {
    /// The JSON document written to the evaluator's stdin.
    pub fn evaluator_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Build an [`ExecutionRequest`] from raw client input.
///
/// Fails with [`CoreError::Validation`] only when the mode is unknown, the
/// mode-specific required field is blank, `rce_method` is invalid in read
/// mode, or `local_scope` is not an object.
pub fn normalize(raw: &Map<String, Value>) -> Result<ExecutionRequest, CoreError> {
    let text = |key: &str| raw.get(key).map(to_text).unwrap_or_default();

    // Only an absent key defaults; an explicit null is an unknown mode.
    let mode_raw = match raw.get("mode") {
        None => Mode::Rce.as_str().to_string(),
        Some(Value::Null) => "none".to_string(),
        Some(v) => to_text(v).trim().to_lowercase(),
    };
    let mode = Mode::parse(&mode_raw)
        .ok_or_else(|| CoreError::Validation("mode must be 'rce' or 'read'.".to_string()))?;

    let cmd = text("cmd").trim().to_string();
    let filepath = text("filepath").trim().to_string();
    let mut rce_method = text("rce_method").trim().to_lowercase();

    match mode {
        Mode::Rce => {
            if cmd.is_empty() {
                return Err(CoreError::Validation(
                    "cmd is required in rce mode.".to_string(),
                ));
            }
            // Not validated against exec/eval in rce mode.
            if rce_method.is_empty() {
                rce_method = defaults::RCE_METHOD.to_string();
            }
        }
        Mode::Read => {
            if filepath.is_empty() {
                return Err(CoreError::Validation(
                    "filepath is required in read mode.".to_string(),
                ));
            }
            if !matches!(rce_method.as_str(), "exec" | "eval") {
                return Err(CoreError::Validation(
                    "rce_method must be 'exec' or 'eval'.".to_string(),
                ));
            }
        }
    }

    let options = ExecutionOptions {
        local_scope: parse_scope(raw.get("local_scope"))?,
        banned_chr: parse_list(raw.get("banned_chr")),
        allowed_chr: parse_list(raw.get("allowed_chr")),
        banned_ast: parse_list(raw.get("banned_ast")),
        banned_re: parse_list(raw.get("banned_re")),
        max_length: to_int(raw.get("max_length"), None),
        allow_unicode_bypass: to_bool(
            raw.get("allow_unicode_bypass"),
            defaults::ALLOW_UNICODE_BYPASS,
        ),
        print_all_payload: to_bool(raw.get("print_all_payload"), defaults::PRINT_ALL_PAYLOAD),
        interactive: to_bool(raw.get("interactive"), defaults::INTERACTIVE),
        depth: to_int(raw.get("depth"), Some(defaults::DEPTH)).unwrap_or(defaults::DEPTH),
        recursion_limit: to_int(raw.get("recursion_limit"), Some(defaults::RECURSION_LIMIT))
            .unwrap_or(defaults::RECURSION_LIMIT),
        log_level: LogLevel::from_client(raw.get("log_level")),
    };

    let timeout_sec = to_int(raw.get("timeout_sec"), Some(defaults::TIMEOUT_SEC))
        .unwrap_or(defaults::TIMEOUT_SEC)
        .clamp(defaults::MIN_TIMEOUT_SEC, defaults::MAX_TIMEOUT_SEC) as u64;

    Ok(ExecutionRequest {
        mode,
        cmd,
        filepath,
        rce_method,
        is_allow_exception_leak: to_bool(
            raw.get("is_allow_exception_leak"),
            defaults::IS_ALLOW_EXCEPTION_LEAK,
        ),
        options,
        timeout_sec,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
