//! Per-connection pipeline.
//!
//! Handles the read/write loop for a single accepted socket:
//! frame → decode → normalize → authorize → dispatch → respond, strictly
//! one response per frame and in order.
//!
//! ```text
//! Accepted → AwaitingFrame → Dispatching → Responding → AwaitingFrame → … → Closed
//! ```

use std::fmt;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

use crate::dispatch::HostWorker;
use crate::error::DispatchError;
use crate::protocol::{AuthGate, FrameReader, WireResponse, decode_record, normalize, write_frame};

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, nothing read yet.
    Accepted,
    /// Waiting for the next complete frame.
    AwaitingFrame,
    /// A frame is being decoded and executed.
    Dispatching,
    /// The response is being written.
    Responding,
    /// Terminal: peer gone, transport error or server stopped.
    Closed,
}

impl ConnectionState {
    /// Returns `true` for the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "accepted",
            Self::AwaitingFrame => "awaiting_frame",
            Self::Dispatching => "dispatching",
            Self::Responding => "responding",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Read-only context every connection shares.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Token check derived from the server config.
    pub gate: AuthGate,
    /// Handle to the serial host worker.
    pub worker: HostWorker,
}

/// Runs the pipeline until the peer closes, a transport error occurs or
/// `shutdown` flips to `true`.
///
/// Shutdown is only observed while waiting for a frame: a command that
/// is already dispatching runs to completion and its response is sent.
/// Returns the number of frames handled.
pub async fn run_connection<S>(
    stream: S,
    ctx: ConnectionContext,
    mut shutdown: watch::Receiver<bool>,
) -> usize
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut frames = FrameReader::new(reader);
    let mut state = ConnectionState::Accepted;
    let mut handled = 0_usize;

    loop {
        transition(&mut state, ConnectionState::AwaitingFrame);
        if *shutdown.borrow() {
            break;
        }

        let next = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!("server stopping, closing connection");
                    break;
                }
                continue;
            }
            next = frames.next_frame() => next,
        };

        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!("peer closed connection");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "read failed, closing connection");
                break;
            }
        };

        transition(&mut state, ConnectionState::Dispatching);
        tracing::debug!(frame = %truncate(&frame, 200), "received frame");
        let response = handle_frame(&frame, &ctx).await;

        transition(&mut state, ConnectionState::Responding);
        tracing::debug!(
            success = response.success,
            result = %response_preview(&response),
            "sending response"
        );
        if let Err(e) = write_frame(&mut writer, &response).await {
            tracing::warn!(error = %e, "write failed, closing connection");
            break;
        }
        handled = handled.saturating_add(1);
    }

    transition(&mut state, ConnectionState::Closed);
    handled
}

/// Runs one frame through decode, normalization, the gate and the worker.
pub async fn handle_frame(frame: &str, ctx: &ConnectionContext) -> WireResponse {
    let outcome = execute(frame, ctx).await;
    if let Err(e) = &outcome {
        tracing::debug!(error = %e, "command failed");
    }
    outcome.into()
}

async fn execute(frame: &str, ctx: &ConnectionContext) -> Result<Value, DispatchError> {
    let record = decode_record(frame)?;
    let command = normalize(&record);
    ctx.gate.authorize(&command)?;
    tracing::debug!(command = %command.label(), "dispatching");
    ctx.worker.submit(command).await
}

fn transition(state: &mut ConnectionState, next: ConnectionState) {
    if *state != next {
        tracing::trace!(from = %state, to = %next, "connection state");
        *state = next;
    }
}

fn response_preview(response: &WireResponse) -> String {
    let text = match (&response.result, &response.error) {
        (Some(Value::String(s)), _) => s.clone(),
        (Some(other), _) => other.to_string(),
        (None, Some(err)) => err.clone(),
        (None, None) => String::new(),
    };
    truncate(&text, 100)
}

/// Cuts `text` to at most `max` characters, marking the cut with `...`.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", text.get(..idx).unwrap_or(text)),
        None => text.to_string(),
    }
}
