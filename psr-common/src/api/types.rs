//! Shared API request/response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authentication fields carried in every mutating request body
///
/// # Examples
///
/// ```
/// use psr_common::api::types::AuthFields;
///
/// let fields: AuthFields =
///     serde_json::from_str(r#"{"timestamp": 1730000000000, "hash": "abc123"}"#).unwrap();
/// assert_eq!(fields.timestamp, 1730000000000);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthFields {
    /// Unix epoch time in milliseconds
    pub timestamp: i64,

    /// SHA-256 hash (64 hex chars)
    pub hash: String,
}

/// JSON error body
///
/// `error` is a stable snake_case identifier clients can match on; `message`
/// is human-readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}
