//! Canonical command type and the normalizer for both wire shapes.
//!
//! Two request shapes coexist on the wire:
//!
//! ```text
//! canonical: {"type": "select", "name": "Cube", "token": "..."}
//! legacy:    {"command": "select", "args": {"name": "Cube"}, "token": "..."}
//! ```
//!
//! [`normalize`] reduces both to one [`Command`]. Records that carry
//! neither key (or name a verb outside [`Verb`]) normalize to
//! [`CommandBody::Unrecognized`], which the dispatcher rejects.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::DispatchError;

/// Default text resource name for `text` commands.
pub const DEFAULT_TEXT_NAME: &str = "SCENE_LINK_SCRIPT";

/// Default object kind for `create` commands.
pub const DEFAULT_OBJECT_KIND: &str = "MESH";

/// Default object name for `create` commands.
pub const DEFAULT_OBJECT_NAME: &str = "Object";

/// The fixed set of supported verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Run code with stdout captured.
    Script,
    /// Write (and optionally run) a named text resource.
    Text,
    /// Resolve a dotted property path.
    Property,
    /// Report a status snapshot.
    Status,
    /// Select an object by name.
    Select,
    /// Create a placeholder object.
    Create,
}

impl Verb {
    /// All supported verbs.
    pub const ALL: [Self; 6] = [
        Self::Script,
        Self::Text,
        Self::Property,
        Self::Status,
        Self::Select,
        Self::Create,
    ];

    /// Returns the wire name of the verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Text => "text",
            Self::Property => "property",
            Self::Status => "status",
            Self::Select => "select",
            Self::Create => "create",
        }
    }

    /// Parses a wire name. Matching is exact and case-sensitive.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == name)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verb-specific payload of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandBody {
    /// Run `code`.
    Script {
        /// Source text to execute.
        code: String,
    },
    /// Write `code` into the text resource `name`, running it if `run`.
    Text {
        /// Text resource name.
        name: String,
        /// Resource content.
        code: String,
        /// Whether to execute the content after writing it.
        run: bool,
    },
    /// Resolve `path` against the host context.
    Property {
        /// Dotted attribute path, e.g. `scene.name`.
        path: String,
    },
    /// Report host status.
    Status,
    /// Select the object named `name`.
    Select {
        /// Exact object name.
        name: String,
    },
    /// Create an object of `kind` named `name`.
    Create {
        /// Requested object kind.
        kind: String,
        /// Requested object name.
        name: String,
    },
    /// A record that did not name a supported verb.
    Unrecognized {
        /// The verb the record asked for, when it named one.
        verb: Option<String>,
    },
}

impl CommandBody {
    /// Returns the verb, or `None` for unrecognized records.
    #[must_use]
    pub const fn verb(&self) -> Option<Verb> {
        match self {
            Self::Script { .. } => Some(Verb::Script),
            Self::Text { .. } => Some(Verb::Text),
            Self::Property { .. } => Some(Verb::Property),
            Self::Status => Some(Verb::Status),
            Self::Select { .. } => Some(Verb::Select),
            Self::Create { .. } => Some(Verb::Create),
            Self::Unrecognized { .. } => None,
        }
    }
}

/// Canonical unit of work.
///
/// Immutable once built: fields are private and only exposed through
/// shared references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    body: CommandBody,
    token: Option<String>,
}

impl Command {
    /// Creates a command with no token.
    #[must_use]
    pub const fn new(body: CommandBody) -> Self {
        Self { body, token: None }
    }

    /// Attaches a caller-supplied token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the verb-specific payload.
    #[must_use]
    pub const fn body(&self) -> &CommandBody {
        &self.body
    }

    /// Returns the caller-supplied token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns a short label for logging.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.body {
            CommandBody::Unrecognized { verb } => {
                format!("unrecognized({})", verb.as_deref().unwrap_or("-"))
            }
            body => body.verb().map(|verb| verb.to_string()).unwrap_or_default(),
        }
    }
}

/// Decodes one frame into a key-value record.
///
/// # Errors
///
/// Returns [`DispatchError::Decode`] if the frame is not valid JSON or is
/// valid JSON but not an object.
pub fn decode_record(frame: &str) -> Result<Map<String, Value>, DispatchError> {
    match serde_json::from_str::<Value>(frame) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(DispatchError::Decode(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(DispatchError::Decode(e.to_string())),
    }
}

/// Reduces either wire shape to a canonical [`Command`].
///
/// A top-level `type` key wins; otherwise a `command` key is translated
/// using its `args` bag. The top-level `token` is carried over in both
/// cases.
#[must_use]
pub fn normalize(record: &Map<String, Value>) -> Command {
    let body = if let Some(kind) = record.get("type") {
        canonical_body(kind, record)
    } else if let Some(verb) = record.get("command").and_then(Value::as_str) {
        legacy_body(verb, record.get("args"))
    } else {
        CommandBody::Unrecognized { verb: None }
    };

    Command {
        body,
        token: str_field(record, "token"),
    }
}

fn canonical_body(kind: &Value, record: &Map<String, Value>) -> CommandBody {
    let Some(verb) = kind.as_str().and_then(Verb::from_wire) else {
        let verb = match kind {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return CommandBody::Unrecognized { verb: Some(verb) };
    };
    // The kind falls back to the verb itself, which no host accepts.
    build_body(verb, record, "type_arg", verb.as_str())
}

fn legacy_body(verb_name: &str, args: Option<&Value>) -> CommandBody {
    let Some(verb) = Verb::from_wire(verb_name) else {
        return CommandBody::Unrecognized {
            verb: Some(verb_name.to_string()),
        };
    };
    let empty = Map::new();
    let args = args.and_then(Value::as_object).unwrap_or(&empty);
    build_body(verb, args, "type", DEFAULT_OBJECT_KIND)
}

/// Builds the payload for `verb` from `fields`. The two shapes differ only
/// in where `create` keeps the object kind and what it defaults to.
fn build_body(
    verb: Verb,
    fields: &Map<String, Value>,
    kind_key: &str,
    default_kind: &str,
) -> CommandBody {
    let text = |key: &str| str_field(fields, key).unwrap_or_default();
    match verb {
        Verb::Script => CommandBody::Script { code: text("code") },
        Verb::Text => CommandBody::Text {
            name: str_field(fields, "name").unwrap_or_else(|| DEFAULT_TEXT_NAME.to_string()),
            code: text("code"),
            run: fields.get("run").is_some_and(truthy),
        },
        Verb::Property => CommandBody::Property { path: text("path") },
        Verb::Status => CommandBody::Status,
        Verb::Select => CommandBody::Select { name: text("name") },
        Verb::Create => CommandBody::Create {
            kind: str_field(fields, kind_key).unwrap_or_else(|| default_kind.to_string()),
            name: str_field(fields, "name").unwrap_or_else(|| DEFAULT_OBJECT_NAME.to_string()),
        },
    }
}

fn str_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Loose truthiness for flags sent by scripting clients (`1`, `"yes"`).
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("test record must be an object");
        };
        map
    }

    fn norm(value: Value) -> Command {
        normalize(&record(value))
    }

    #[test]
    fn select_shapes_are_equivalent() {
        let canonical = norm(json!({"type": "select", "name": "Cube"}));
        let legacy = norm(json!({"command": "select", "args": {"name": "Cube"}}));
        assert_eq!(canonical, legacy);
        assert_eq!(
            canonical.body(),
            &CommandBody::Select {
                name: "Cube".to_string()
            }
        );
    }

    #[test]
    fn create_shapes_are_equivalent() {
        let canonical = norm(json!({"type": "create", "type_arg": "CURVE", "name": "Arc"}));
        let legacy = norm(json!({"command": "create", "args": {"type": "CURVE", "name": "Arc"}}));
        assert_eq!(canonical, legacy);
        assert_eq!(
            legacy.body(),
            &CommandBody::Create {
                kind: "CURVE".to_string(),
                name: "Arc".to_string()
            }
        );
    }

    #[test]
    fn create_defaults_to_mesh_placeholder() {
        let cmd = norm(json!({"command": "create"}));
        assert_eq!(
            cmd.body(),
            &CommandBody::Create {
                kind: DEFAULT_OBJECT_KIND.to_string(),
                name: DEFAULT_OBJECT_NAME.to_string()
            }
        );
    }

    #[test]
    fn canonical_create_without_kind_keeps_verb_as_kind() {
        let cmd = norm(json!({"type": "create", "name": "X"}));
        assert_eq!(
            cmd.body(),
            &CommandBody::Create {
                kind: "create".to_string(),
                name: "X".to_string()
            }
        );
    }

    #[test]
    fn label_names_the_verb() {
        assert_eq!(norm(json!({"type": "status"})).label(), "status");
        assert_eq!(norm(json!({"type": "nope"})).label(), "unrecognized(nope)");
    }

    #[test]
    fn text_defaults_and_run_flag() {
        let cmd = norm(json!({"command": "text", "args": {"code": "print(1)", "run": 1}}));
        assert_eq!(
            cmd.body(),
            &CommandBody::Text {
                name: DEFAULT_TEXT_NAME.to_string(),
                code: "print(1)".to_string(),
                run: true
            }
        );

        let cmd = norm(json!({"type": "text", "name": "T", "code": "x"}));
        assert!(matches!(cmd.body(), CommandBody::Text { run: false, .. }));
    }

    #[test]
    fn token_is_carried_for_both_shapes() {
        let canonical = norm(json!({"type": "status", "token": "abc"}));
        let legacy = norm(json!({"command": "status", "token": "abc"}));
        assert_eq!(canonical.token(), Some("abc"));
        assert_eq!(legacy.token(), Some("abc"));
    }

    #[test]
    fn token_inside_args_is_ignored() {
        let cmd = norm(json!({"command": "status", "args": {"token": "abc"}}));
        assert_eq!(cmd.token(), None);
    }

    #[test]
    fn type_wins_over_command() {
        let cmd = norm(json!({"type": "status", "command": "select", "args": {"name": "X"}}));
        assert_eq!(cmd.body(), &CommandBody::Status);
    }

    #[test]
    fn record_without_verb_is_unrecognized() {
        let cmd = norm(json!({"code": "print(1)", "token": "t"}));
        assert_eq!(cmd.body(), &CommandBody::Unrecognized { verb: None });
        assert_eq!(cmd.token(), Some("t"));
    }

    #[test]
    fn unknown_verbs_are_unrecognized() {
        let cmd = norm(json!({"type": "explode"}));
        assert_eq!(
            cmd.body(),
            &CommandBody::Unrecognized {
                verb: Some("explode".to_string())
            }
        );

        let cmd = norm(json!({"command": "Select"}));
        assert_eq!(cmd.body().verb(), None);
    }

    #[test]
    fn non_object_args_are_treated_as_empty() {
        let cmd = norm(json!({"command": "script", "args": "print(1)"}));
        assert_eq!(
            cmd.body(),
            &CommandBody::Script {
                code: String::new()
            }
        );
    }

    #[test]
    fn decode_rejects_non_objects() {
        assert!(decode_record(r#"{"type":"status"}"#).is_ok());
        assert!(matches!(decode_record("[1,2]"), Err(DispatchError::Decode(_))));
        assert!(matches!(decode_record("{nope"), Err(DispatchError::Decode(_))));
    }
}
