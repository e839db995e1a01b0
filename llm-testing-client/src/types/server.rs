//! Loosely shaped payloads of the configuration and health endpoints.
//!
//! The backend does not promise a schema for these, so the decoded JSON is
//! kept as-is and fields are read through accessors that return `None` when a
//! value is missing or of an unexpected type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response of `GET /api/config`.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct ServerConfig {
    raw: Value,
}

impl ServerConfig {
    /// Port the backend listens on. Accepts both `"8000"` and `8000`.
    pub fn backend_port(&self) -> Option<String> {
        match self.raw.get("backend_port")? {
            Value::String(port) => Some(port.clone()),
            Value::Number(port) => Some(port.to_string()),
            _ => None,
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.get_str("host")
    }

    pub fn cors_origins(&self) -> Option<&str> {
        self.get_str("cors_origins")
    }

    pub fn debug(&self) -> Option<bool> {
        self.raw.get("debug").and_then(Value::as_bool)
    }

    pub fn environment(&self) -> Option<&str> {
        self.get_str("environment")
    }

    pub fn supported_models_count(&self) -> Option<u64> {
        self.raw.get("supported_models_count").and_then(Value::as_u64)
    }

    /// Any field of the payload, typed or not.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// The payload exactly as received.
    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(Value::as_str)
    }
}

impl From<Value> for ServerConfig {
    fn from(raw: Value) -> Self {
        Self { raw }
    }
}

/// Response of `GET /api/health`.
///
/// The chat router wraps its report as `{ message, data: { status, .. } }`
/// while the bare health route answers `{ status, timestamp }`. Any other
/// JSON, including non-objects, is accepted too.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct HealthReport {
    raw: Value,
}

impl HealthReport {
    /// The reported status, looked up at the top level and then under `data`.
    pub fn status(&self) -> Option<&str> {
        self.raw
            .get("status")
            .and_then(Value::as_str)
            .or_else(|| {
                self.raw
                    .get("data")
                    .and_then(|data| data.get("status"))
                    .and_then(Value::as_str)
            })
    }

    pub fn message(&self) -> Option<&str> {
        self.raw.get("message").and_then(Value::as_str)
    }

    /// Any field of the payload, typed or not.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// The payload exactly as received.
    pub fn as_value(&self) -> &Value {
        &self.raw
    }
}

impl From<Value> for HealthReport {
    fn from(raw: Value) -> Self {
        Self { raw }
    }
}
