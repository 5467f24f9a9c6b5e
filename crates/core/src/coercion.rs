//! Best-effort conversion of loosely typed client fields.
//!
//! Every function here is total except [`parse_scope`]: malformed input falls
//! back to the caller-supplied default instead of failing. This is the only
//! place in the crate allowed to silently default.

use serde_json::{Map, Value};

use crate::error::CoreError;

/// Strings accepted as `true` (compared trimmed and lowercased).
const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];

/// Text form of a scalar client value.
///
/// `null` becomes the empty string, strings pass through, and everything else
/// uses its compact JSON rendering.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce `value` to a boolean.
///
/// Numbers are `true` when nonzero. Strings are `true` only for the
/// [`TRUTHY`] spellings and `false` otherwise. `null`, arrays and objects
/// yield `default`.
pub fn to_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => TRUTHY.contains(&s.trim().to_lowercase().as_str()),
        _ => default,
    }
}

/// Coerce `value` to an integer.
///
/// Integers pass through, finite floats truncate toward zero, and numeric
/// strings are parsed after trimming. Blank strings and anything
/// non-numeric yield `default`.
pub fn to_int(value: Option<&Value>, default: Option<i64>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .or(default),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok().or(default),
        _ => default,
    }
}

/// Parse a list of tokens from a list or delimited text.
///
/// Text is split on line breaks (`\r\n`, `\r`, `\n`) and then on commas.
/// Every token is trimmed and empty tokens are dropped.
pub fn parse_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| to_text(item).trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .split('\n')
            .flat_map(|line| line.split(','))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect(),
        Some(other) => {
            let text = to_text(other);
            let text = text.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        }
    }
}

/// Parse the `local_scope` field.
///
/// `null` and blank strings mean "no scope". Objects are returned as-is.
/// Strings must hold a JSON-encoded object. Any other shape is a
/// [`CoreError::Validation`].
pub fn parse_scope(value: Option<&Value>) -> Result<Option<Map<String, Value>>, CoreError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(CoreError::Validation(
                "local_scope must be a JSON object.".to_string(),
            )),
            Err(e) => Err(CoreError::Validation(format!(
                "local_scope must be valid JSON: {e}"
            ))),
        },
        Some(_) => Err(CoreError::Validation(
            "local_scope must be a JSON object or empty.".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
