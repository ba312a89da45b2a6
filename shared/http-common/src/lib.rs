//! Shared HTTP utilities for the book service workspace.
//!
//! Every JSON response body uses the same envelope:
//! `{"error": bool, "message": string, "data": <payload, omitted when absent>}`.

use serde::{Deserialize, Serialize};

// ============================================================================
// Response Envelope
// ============================================================================

/// Response envelope shared by all endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub error: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Successful response carrying `data` and an empty message.
    pub fn ok(data: T) -> Self {
        Self {
            error: false,
            message: String::new(),
            data: Some(data),
        }
    }

    /// Failed response; `data` is omitted.
    pub fn failure<M: Into<String>>(message: M) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: None,
        }
    }
}

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Build a success envelope as a JSON value.
///
/// Returns: `{"error": false, "message": "", "data": <data>}`
pub fn json_ok<T: Serialize>(data: T) -> serde_json::Value {
    serde_json::to_value(Envelope::ok(data)).unwrap_or_else(|e| json_err(&e.to_string()))
}

/// Build an error envelope as a JSON value.
///
/// Returns: `{"error": true, "message": "<message>"}`
pub fn json_err(message: &str) -> serde_json::Value {
    // Serializing a bool and a string cannot fail
    serde_json::to_value(Envelope::<()>::failure(message)).unwrap_or_default()
}
