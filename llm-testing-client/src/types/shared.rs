use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Detail used when an error response carries no usable `detail` field.
pub const UNKNOWN_ERROR_DETAIL: &str = "An unknown error occurred.";

/// Detail used when a successful streaming response has no readable body.
pub const UNREADABLE_STREAM_DETAIL: &str = "Unable to read the response stream.";

#[derive(Serialize, Deserialize, Default, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

/// An error reported by the backend, or synthesized for transport failures.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub detail: String,
    pub status_code: u16,
}

impl ApiError {
    pub fn new(detail: impl Into<String>, status_code: u16) -> Self {
        Self {
            detail: detail.into(),
            status_code,
        }
    }

    /// A 500 error, used for failures that never produced an HTTP status.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(detail, 500)
    }

    /// Builds an error from a non-2xx response body.
    ///
    /// Falls back to [`UNKNOWN_ERROR_DETAIL`] when the body is not JSON or its
    /// `detail` is missing or falsy (null, `false`, `0`, `""`). Other
    /// non-string details (validation error lists, for instance) are kept as
    /// compact JSON text.
    pub fn from_response(status_code: u16, body: &[u8]) -> Self {
        let detail = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|body| body.detail)
            .and_then(|detail| match detail {
                Value::Null | Value::Bool(false) => None,
                Value::Number(n) if n.as_f64() == Some(0.0) => None,
                Value::String(s) if s.is_empty() => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .unwrap_or_else(|| UNKNOWN_ERROR_DETAIL.to_string());
        Self::new(detail, status_code)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.detail, self.status_code)
    }
}

impl std::error::Error for ApiError {}

/// Error payload shape returned by the backend.
#[derive(Deserialize, Debug, Clone)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}
