//! Relay endpoints: command execution and health check.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::Value;

use super::dto::{ExecuteRequest, HealthResponse, RelayResponse, translate_request};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};
use crate::protocol::FailureKind;

/// Relay routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/execute", post(execute_handler))
        .route("/health", get(health_handler))
}

/// `POST /execute`: Forward one command to the connection server.
///
/// # Errors
///
/// Returns a [`RelayError`] for a malformed body, a rejected token or a
/// failed hop. Inner command failures are not errors here: they come
/// back as `200` with `ok: false`.
#[utoipa::path(
    post,
    path = "/execute",
    tag = "Relay",
    summary = "Execute a command",
    description = "Translates the body into one command, sends it to the connection server over a fresh socket and returns its response.",
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "Command handled; `ok` reports the inner outcome", body = RelayResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 401, description = "Token rejected by the connection server", body = ErrorResponse),
        (status = 502, description = "Broken exchange with the connection server", body = ErrorResponse),
        (status = 503, description = "Connection server not listening", body = ErrorResponse),
        (status = 504, description = "Connection server did not answer in time", body = ErrorResponse),
    )
)]
pub async fn execute_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, RelayError> {
    let Json(body) = body.map_err(|e| RelayError::BadRequest(e.body_text()))?;
    let record = translate_request(body, state.relay.default_token())?;

    let response = state.relay.send(&record).await?;
    if response.kind == Some(FailureKind::Unauthorized) {
        return Err(RelayError::Unauthorized(
            response.error.unwrap_or_else(|| "Unauthorized".to_string()),
        ));
    }

    tracing::debug!(ok = response.success, "relay call completed");
    Ok((StatusCode::OK, Json(RelayResponse::from(response))))
}

/// `GET /health`: Relay health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Relay",
    summary = "Health check",
    description = "Returns relay status, version, and current timestamp. Does not contact the connection server.",
    responses(
        (status = 200, description = "Relay is up", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "online".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}
