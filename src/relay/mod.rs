//! HTTP relay: one POST per command, forwarded over a fresh socket.
//!
//! The relay holds no state between calls. Each request is translated
//! into a wire record, sent with [`RelayClient::send`] and the single
//! response frame is returned as JSON.

pub mod client;
pub mod dto;
pub mod handlers;

pub use client::RelayClient;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the relay endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(handlers::execute_handler, handlers::health_handler),
    components(schemas(
        dto::ExecuteRequest,
        dto::RelayResponse,
        dto::HealthResponse,
        crate::error::ErrorResponse
    )),
    tags((name = "Relay", description = "Scene command relay"))
)]
pub struct ApiDoc;

/// Builds the relay router.
pub fn build_router() -> Router<AppState> {
    handlers::routes()
}
