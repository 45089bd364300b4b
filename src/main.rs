//! scene-link relay entry point.
//!
//! Starts the Axum HTTP relay in front of the connection server.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use scene_link::app_state::AppState;
use scene_link::config::RelayConfig;
use scene_link::relay::{self, RelayClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = RelayConfig::from_env()?;
    tracing::info!(
        listen = %config.listen_addr,
        target = %config.target_addr,
        timeout_ms = config.timeout.as_millis(),
        "starting scene-link relay"
    );

    let app_state = AppState {
        relay: Arc::new(RelayClient::from_config(&config)),
    };

    // Build router
    let app = Router::new().merge(relay::build_router());
    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", relay::ApiDoc::openapi()),
        )
    };
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
