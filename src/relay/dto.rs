//! Relay request/response bodies and request translation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::error::RelayError;
use crate::protocol::WireResponse;
use crate::protocol::command::DEFAULT_TEXT_NAME;

/// Documented shape of `POST /execute`.
///
/// The endpoint accepts any JSON object; this struct only describes the
/// commonly used fields. Canonical (`type`) and legacy (`command` +
/// `args`) records are forwarded as-is.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    /// `blender` (default) or `script` runs `script`; `text` writes a
    /// text resource; any other verb is forwarded unchanged.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Code to run or write.
    #[serde(default)]
    pub script: Option<String>,
    /// Alias of `script`.
    #[serde(default)]
    pub code: Option<String>,
    /// Text resource name for `text`.
    #[serde(default)]
    pub name: Option<String>,
    /// Run the text resource after writing it.
    #[serde(default)]
    pub run: Option<bool>,
    /// Legacy verb; used with `args`.
    #[serde(default)]
    pub command: Option<String>,
    /// Legacy argument bag.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub args: Option<Value>,
    /// Shared secret for the connection server.
    #[serde(default)]
    pub token: Option<String>,
}

/// Body of every handled `POST /execute` call.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RelayResponse {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Inner result, passed through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub result: Option<Value>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Diagnostic trace from the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl From<WireResponse> for RelayResponse {
    fn from(resp: WireResponse) -> Self {
        Self {
            ok: resp.success,
            result: resp.result,
            error: resp.error,
            trace: resp.trace,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `online`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Turns an HTTP body into the record sent to the connection server.
///
/// - `type` absent, `blender` or `script` with a `script` field becomes a
///   canonical `script` command,
/// - `type: "text"` becomes a canonical `text` command,
/// - anything else (other canonical verbs, legacy `command` records) is
///   forwarded with `script` aliased to `code`,
/// - a `type` that is not a string is forwarded unchanged, so the server
///   answers it as an unknown command.
///
/// `default_token` is added when the body carries no `token`.
///
/// # Errors
///
/// Returns [`RelayError::BadRequest`] if the body is not an object or a
/// code field is not a string.
pub fn translate_request(
    body: Value,
    default_token: Option<&str>,
) -> Result<Map<String, Value>, RelayError> {
    let Value::Object(mut body) = body else {
        return Err(RelayError::BadRequest(
            "request body must be a JSON object".to_string(),
        ));
    };

    let code = code_field(&body)?;
    let kind = body.get("type").and_then(Value::as_str).map(str::to_string);
    let legacy = body.contains_key("command") && !body.contains_key("type");
    // A `type` that is present but not a string is left for the server to reject.
    let malformed_kind = body.get("type").is_some_and(|t| !t.is_string());

    let mut record = match kind.as_deref() {
        _ if legacy || malformed_kind => body,
        None | Some("blender" | "script") => {
            let mut record = Map::new();
            record.insert("type".into(), "script".into());
            record.insert("code".into(), code.unwrap_or_default().into());
            carry(&mut body, &mut record, "token");
            record
        }
        Some("text") => {
            let mut record = Map::new();
            record.insert("type".into(), "text".into());
            record.insert("code".into(), code.unwrap_or_default().into());
            let name = body
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_TEXT_NAME)
                .to_string();
            record.insert("name".into(), name.into());
            let run = body.get("run").and_then(Value::as_bool).unwrap_or(false);
            record.insert("run".into(), run.into());
            carry(&mut body, &mut record, "token");
            record
        }
        Some(_) => {
            if let Some(code) = code {
                body.insert("code".into(), code.into());
            }
            body.remove("script");
            body
        }
    };

    if let Some(token) = default_token
        && !record.contains_key("token")
    {
        record.insert("token".into(), token.into());
    }
    Ok(record)
}

/// Reads `script`, falling back to `code`. Empty `script` defers to `code`.
fn code_field(body: &Map<String, Value>) -> Result<Option<String>, RelayError> {
    let field = |key: &str| match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RelayError::BadRequest(format!("`{key}` must be a string"))),
    };
    let script = field("script")?.filter(|s| !s.is_empty());
    match script {
        Some(script) => Ok(Some(script)),
        None => field("code"),
    }
}

fn carry(from: &mut Map<String, Value>, to: &mut Map<String, Value>, key: &str) {
    if let Some(value) = from.remove(key) {
        to.insert(key.to_string(), value);
    }
}
