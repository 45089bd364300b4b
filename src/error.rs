//! Error types for the bridge, the dispatcher and the relay.
//!
//! - [`BridgeError`]: transport-level failures of the connection server.
//!   Logged and torn down, never sent to a client as a command result.
//! - [`DispatchError`]: per-command failures. Each becomes a failure
//!   response on the same connection, which stays open.
//! - [`RelayError`]: failures of one HTTP relay call, mapped to distinct
//!   HTTP status codes.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::host::HostError;
use crate::protocol::FailureKind;

/// Transport failures of the connection server.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The listening socket could not be bound (e.g. port already in use).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the server tried to bind.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The serial host worker thread could not be started.
    #[error("failed to start host worker: {0}")]
    Worker(#[source] std::io::Error),

    /// Any other socket I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-command failure reported back to the client.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The frame was not a valid key-value record.
    #[error("Invalid JSON: {0}")]
    Decode(String),

    /// The token check rejected the command.
    #[error("Unauthorized")]
    Unauthorized,

    /// The record named no supported verb.
    #[error("Unknown command type: {}", .0.as_deref().unwrap_or("<none>"))]
    UnknownCommand(Option<String>),

    /// The host capability returned an error.
    #[error("{0}")]
    Host(#[from] HostError),

    /// The host capability panicked while handling the command.
    #[error("host capability panicked: {0}")]
    HostPanicked(String),

    /// The serial host worker is no longer running.
    #[error("host worker unavailable")]
    WorkerUnavailable,
}

impl DispatchError {
    /// Returns the failure category sent on the wire.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Decode(_) => FailureKind::Decode,
            Self::Unauthorized => FailureKind::Unauthorized,
            Self::UnknownCommand(_) => FailureKind::UnknownCommand,
            Self::Host(_) | Self::HostPanicked(_) => FailureKind::Host,
            Self::WorkerUnavailable => FailureKind::Unavailable,
        }
    }

    /// Returns the diagnostic trace, when one is available.
    #[must_use]
    pub fn trace(&self) -> Option<&str> {
        match self {
            Self::Host(err) => err.trace(),
            _ => None,
        }
    }
}

/// JSON body of every relay error response.
///
/// ```json
/// { "ok": false, "error": "connection server unavailable at 127.0.0.1:9999" }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub ok: bool,
    /// Human-readable error message.
    pub error: String,
}

/// Failure of one relay call.
///
/// | Variant | HTTP status |
/// |---------|-------------|
/// | `BadRequest` | 400 Bad Request |
/// | `Unauthorized` | 401 Unauthorized |
/// | `Unavailable` | 503 Service Unavailable |
/// | `TimedOut` | 504 Gateway Timeout |
/// | `Io`, `Protocol` | 502 Bad Gateway |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The HTTP request body is not a usable command.
    #[error("malformed request: {0}")]
    BadRequest(String),

    /// The connection server rejected the token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Nothing is listening at the connection server address.
    #[error("connection server unavailable at {0}")]
    Unavailable(SocketAddr),

    /// Connecting or waiting for the response exceeded the relay timeout.
    #[error("connection server timed out after {0} ms")]
    TimedOut(u128),

    /// Any other socket failure on the relay hop.
    #[error("relay i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection server answered with something that is not a
    /// response frame.
    #[error("relay protocol error: {0}")]
    Protocol(String),
}

impl RelayError {
    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Io(_) | Self::Protocol(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
