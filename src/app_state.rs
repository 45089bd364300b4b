//! Shared application state injected into the relay handlers.

use std::sync::Arc;

use crate::relay::RelayClient;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Client for the connection server hop.
    pub relay: Arc<RelayClient>,
}
