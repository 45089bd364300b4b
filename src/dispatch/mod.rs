//! Command dispatcher: routes a canonical [`Command`] to the host.
//!
//! Logical misses (no code, object not found, unsupported kind) are
//! ordinary textual results. Only unknown verbs and host failures become
//! [`DispatchError`]s.

pub mod worker;

pub use worker::HostWorker;

use serde::Serialize;
use serde_json::Value;

use crate::error::DispatchError;
use crate::host::{HostCapability, HostError, ScriptContext, StatusSnapshot};
use crate::protocol::{Command, CommandBody};

/// Object kind `create` supports.
pub const PLACEHOLDER_KIND: &str = "MESH";

/// Result text when a script or text command carries no code.
pub const NO_CODE: &str = "No code provided";

/// Result text when a script printed nothing.
pub const NO_OUTPUT: &str = "Script executed successfully (no output)";

/// Status result: host snapshot plus the bridge's own version.
#[derive(Debug, Serialize)]
struct StatusReport {
    #[serde(flatten)]
    snapshot: StatusSnapshot,
    bridge_version: &'static str,
}

/// Routes commands to a [`HostCapability`].
///
/// Owned by the serial [`HostWorker`]; never shared.
#[derive(Debug)]
pub struct Dispatcher<H> {
    host: H,
}

impl<H: HostCapability> Dispatcher<H> {
    /// Wraps `host`.
    pub const fn new(host: H) -> Self {
        Self { host }
    }

    /// Returns the wrapped host.
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Executes `command` and returns its result.
    ///
    /// The command is only read, never modified.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownCommand`] for unrecognized records
    /// and [`DispatchError::Host`] when the host capability fails.
    pub fn dispatch(&mut self, command: &Command) -> Result<Value, DispatchError> {
        match command.body() {
            CommandBody::Script { code } => self.run_script(code).map(Value::String),
            CommandBody::Text { name, code, run } => self.write_text(name, code, *run),
            CommandBody::Property { path } => {
                let resolved = self.host.resolve_property(path)?;
                Ok(Value::String(
                    resolved.unwrap_or_else(|| format!("Property not found: {path}")),
                ))
            }
            CommandBody::Status => {
                let report = StatusReport {
                    snapshot: self.host.status()?,
                    bridge_version: env!("CARGO_PKG_VERSION"),
                };
                serde_json::to_value(report).map_err(|e| {
                    DispatchError::Host(HostError::Execution {
                        message: format!("failed to encode status: {e}"),
                        trace: None,
                    })
                })
            }
            CommandBody::Select { name } => {
                let message = if self.host.select_object(name)? {
                    format!("Selected '{name}'")
                } else {
                    format!("Object '{name}' not found")
                };
                Ok(Value::String(message))
            }
            CommandBody::Create { kind, name } => {
                if kind != PLACEHOLDER_KIND {
                    return Ok(Value::String(format!("Unsupported object type: {kind}")));
                }
                let assigned = self.host.create_mesh(name)?;
                Ok(Value::String(format!("Created mesh object '{assigned}'")))
            }
            CommandBody::Unrecognized { verb } => Err(DispatchError::UnknownCommand(verb.clone())),
        }
    }

    /// Runs code, preferring a viewport context when it calls operators
    /// and falling back to direct execution when none is available.
    fn run_script(&mut self, code: &str) -> Result<String, DispatchError> {
        if code.is_empty() {
            return Ok(NO_CODE.to_string());
        }

        let context = if code.contains("ops.") {
            ScriptContext::Viewport
        } else {
            ScriptContext::Direct
        };

        let output = match self.host.run_script(code, context) {
            Err(HostError::ContextUnavailable) if context == ScriptContext::Viewport => {
                tracing::debug!("viewport context unavailable, running directly");
                self.host.run_script(code, ScriptContext::Direct)?
            }
            other => other?,
        };

        if output.is_empty() {
            Ok(NO_OUTPUT.to_string())
        } else {
            Ok(output)
        }
    }

    fn write_text(&mut self, name: &str, code: &str, run: bool) -> Result<Value, DispatchError> {
        if code.is_empty() {
            return Ok(Value::String(NO_CODE.to_string()));
        }
        self.host.write_text(name, code)?;
        tracing::debug!(name, run, "text resource written");

        if run {
            self.run_script(code).map(Value::String)
        } else {
            Ok(Value::String(format!("Text '{name}' updated (not run)")))
        }
    }
}
