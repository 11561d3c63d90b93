//! Response normalization.
//!
//! Workflow webhooks answer in several shapes for the same logical payload:
//!
//! ```text
//! {"a": 1}              bare object
//! [{"a": 1}]            single-element array
//! {"json": {"a": 1}}    item wrapper
//! [{"json": {"a": 1}}]  both
//! ```
//!
//! All of them collapse to `{"a": 1}`. The array unwrap runs before the
//! `json` unwrap and each runs at most once.

use serde_json::{Map, Value};

/// Normalize a raw downstream body into a canonical JSON value.
pub fn normalize(raw: &str) -> Value {
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(inner)) => decode_nested(inner),
        Ok(value) => value,
        Err(_) => Value::String(raw.to_string()),
    };

    unwrap_item(unwrap_array(value))
}

/// Normalize a body for a client-facing success response. Plain text is
/// wrapped as `{"message": text}` so the body is always structured.
pub fn normalize_for_client(raw: &str) -> Value {
    match normalize(raw) {
        Value::String(text) => {
            let mut map = Map::new();
            map.insert("message".to_string(), Value::String(text));
            Value::Object(map)
        }
        other => other,
    }
}

/// A JSON string that itself holds JSON is a doubly-encoded payload.
fn decode_nested(inner: String) -> Value {
    match serde_json::from_str::<Value>(&inner) {
        Ok(decoded @ (Value::Object(_) | Value::Array(_))) => decoded,
        _ => Value::String(inner),
    }
}

fn unwrap_array(value: Value) -> Value {
    match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    }
}

fn unwrap_item(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("json") => {
            map.remove("json").unwrap_or(Value::Null)
        }
        other => other,
    }
}
