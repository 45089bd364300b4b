//! scene-link connection server entry point.
//!
//! Runs the in-memory scene host behind the connection server. The host
//! launch hook starts listening when autostart is on; Ctrl-C runs the
//! shutdown hook.

use tracing_subscriber::EnvFilter;

use scene_link::config::ServerConfig;
use scene_link::dispatch::HostWorker;
use scene_link::host::{SceneHost, ScriptRunner};
use scene_link::server::ConnectionServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let runner = ScriptRunner::from_env();
    tracing::info!(
        addr = %config.socket_addr(),
        interpreter = runner.program(),
        autostart = config.autostart,
        "starting scene-link host"
    );

    let worker = HostWorker::spawn(SceneHost::new(runner), config.worker_queue)?;
    let server = ConnectionServer::new(config, worker);

    if server.on_host_launch().await?.is_none() {
        tracing::warn!("SCENE_LINK_AUTOSTART is off; nothing to serve, exiting");
        return Ok(());
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    server.on_host_shutdown().await;

    Ok(())
}
