//! Host capability boundary.
//!
//! The bridge drives the host application's object model only through
//! [`HostCapability`]. Everything behind the trait is opaque: the
//! dispatcher never learns how scripts run or how objects are stored.
//! [`SceneHost`] is the in-memory implementation used by the standalone
//! `scene-host` binary.

pub mod scene;
pub mod script;

#[cfg(test)]
pub(crate) mod fake;

pub use scene::SceneHost;
pub use script::ScriptRunner;

use serde::Serialize;

/// Execution context a script asks the host for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptContext {
    /// Run with an interactive viewport/operator context.
    Viewport,
    /// Run directly in the host environment with no context override.
    Direct,
}

/// Failure raised by the host capability.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The requested [`ScriptContext::Viewport`] does not exist right now.
    #[error("viewport context unavailable")]
    ContextUnavailable,

    /// The host ran the request and it failed.
    #[error("{message}")]
    Execution {
        /// Human-readable failure message.
        message: String,
        /// Diagnostic trace, when the host produced one.
        trace: Option<String>,
    },

    /// The host could not be reached or could not spawn its executor.
    #[error("host i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Returns the diagnostic trace attached to this error, if any.
    #[must_use]
    pub fn trace(&self) -> Option<&str> {
        match self {
            Self::Execution { trace, .. } => trace.as_deref(),
            Self::ContextUnavailable | Self::Io(_) => None,
        }
    }
}

/// Fixed snapshot of the host's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Host application version string.
    pub version: String,
    /// Active scene/document name.
    pub scene: String,
    /// Name of the active selection, `"None"` when nothing is active.
    pub active_object: String,
    /// Number of objects in the object table.
    pub object_count: usize,
    /// Number of mesh resources.
    pub mesh_count: usize,
}

/// In-process surface of the host application.
///
/// Implementations are owned by a single worker thread and are therefore
/// only required to be [`Send`]; calls never overlap.
pub trait HostCapability: Send + 'static {
    /// Runs `code` in the host's live environment and returns everything
    /// it wrote to standard output.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ContextUnavailable`] when `context` cannot be
    /// provided, or [`HostError::Execution`] when the code itself fails.
    fn run_script(&mut self, code: &str, context: ScriptContext) -> Result<String, HostError>;

    /// Creates or replaces the named text resource with `code`.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the host rejects the write.
    fn write_text(&mut self, name: &str, code: &str) -> Result<(), HostError>;

    /// Resolves a dotted attribute path against the live context graph.
    ///
    /// Returns `Ok(None)` when any segment is missing.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] only for failures other than a missing path.
    fn resolve_property(&self, path: &str) -> Result<Option<String>, HostError>;

    /// Returns the current status snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the host state cannot be read.
    fn status(&self) -> Result<StatusSnapshot, HostError>;

    /// Marks the object with exactly this name as the active selection.
    ///
    /// Returns `Ok(false)` when no such object exists.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the selection cannot be changed.
    fn select_object(&mut self, name: &str) -> Result<bool, HostError>;

    /// Creates an empty mesh object and links it into the active
    /// collection, returning the name the host actually assigned.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the object cannot be created.
    fn create_mesh(&mut self, name: &str) -> Result<String, HostError>;
}
