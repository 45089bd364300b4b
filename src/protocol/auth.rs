//! Shared-secret authorization gate.

use super::command::Command;
use crate::error::DispatchError;

/// Checks each command's token against the configured secret.
///
/// With no secret configured every command passes (local-only trust).
#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    token: Option<String>,
}

impl AuthGate {
    /// Creates a gate for `token`; `None` means open mode.
    #[must_use]
    pub const fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Returns `true` when no secret is configured.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.token.is_none()
    }

    /// Passes or rejects `command`. Comparison is exact and case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unauthorized`] when a secret is configured
    /// and the command's token is absent or different.
    pub fn authorize(&self, command: &Command) -> Result<(), DispatchError> {
        match self.token.as_deref() {
            None => Ok(()),
            Some(expected) if command.token() == Some(expected) => Ok(()),
            Some(_) => Err(DispatchError::Unauthorized),
        }
    }
}
