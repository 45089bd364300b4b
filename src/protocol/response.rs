//! Wire response record.
//!
//! ```json
//! {"success": true, "result": "Selected 'Cube'"}
//! {"success": false, "error": "Unauthorized", "kind": "unauthorized"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// Machine-readable failure category carried next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The frame was not a valid key-value record.
    Decode,
    /// The token check rejected the command.
    Unauthorized,
    /// The record named no supported verb.
    UnknownCommand,
    /// The host capability failed.
    Host,
    /// The serial host worker is gone.
    Unavailable,
}

/// One response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    /// Whether the command succeeded.
    pub success: bool,
    /// Command result (text, or an object for `status`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    /// Diagnostic trace, when the host produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl WireResponse {
    /// Builds a success response.
    #[must_use]
    pub const fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            kind: None,
            trace: None,
        }
    }

    /// Builds a failure response.
    #[must_use]
    pub fn failure(kind: FailureKind, error: impl Into<String>, trace: Option<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            kind: Some(kind),
            trace,
        }
    }
}

impl From<Result<Value, DispatchError>> for WireResponse {
    fn from(outcome: Result<Value, DispatchError>) -> Self {
        match outcome {
            Ok(result) => Self::ok(result),
            Err(err) => err.into(),
        }
    }
}

impl From<DispatchError> for WireResponse {
    fn from(err: DispatchError) -> Self {
        let trace = err.trace().map(str::to_string);
        Self::failure(err.kind(), err.to_string(), trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_omits_error_fields() {
        let value = serde_json::to_value(WireResponse::ok(json!("done"))).ok();
        assert_eq!(value, Some(json!({"success": true, "result": "done"})));
    }

    #[test]
    fn unauthorized_has_fixed_reason() {
        let resp = WireResponse::from(DispatchError::Unauthorized);
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Unauthorized"));
        assert_eq!(resp.kind, Some(FailureKind::Unauthorized));
    }

    #[test]
    fn minimal_failure_record_parses() {
        let parsed: Option<WireResponse> =
            serde_json::from_str(r#"{"success": false, "error": "boom"}"#).ok();
        assert_eq!(
            parsed.map(|r| (r.success, r.error, r.kind)),
            Some((false, Some("boom".to_string()), None))
        );
    }
}
