//! Connection server: listener lifecycle and the accept loop.
//!
//! [`ConnectionServer`] is an explicit owned object. The host's lifecycle
//! hooks call [`ConnectionServer::on_host_launch`] and
//! [`ConnectionServer::on_host_shutdown`]; nothing lives in module-level
//! globals.

pub mod connection;

pub use connection::{ConnectionContext, ConnectionState, run_connection};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::dispatch::HostWorker;
use crate::error::BridgeError;
use crate::protocol::AuthGate;

/// Outcome of [`ConnectionServer::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new listener was bound at this address.
    Started(SocketAddr),
    /// The server was already listening at this address; nothing changed.
    AlreadyRunning(SocketAddr),
}

impl StartOutcome {
    /// Returns the listening address in either case.
    #[must_use]
    pub const fn addr(self) -> SocketAddr {
        match self {
            Self::Started(addr) | Self::AlreadyRunning(addr) => addr,
        }
    }
}

/// A bound listener and the task accepting on it.
#[derive(Debug)]
struct Listening {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

#[derive(Debug)]
struct ServerState {
    config: Arc<ServerConfig>,
    listening: Option<Listening>,
}

/// Long-lived listener that hands each accepted socket its own pipeline.
///
/// # Concurrency
///
/// - Each connection runs on its own task; connections share only the
///   read-only config and the serial [`HostWorker`].
/// - Start, stop and restart are serialized by an internal lock.
#[derive(Debug)]
pub struct ConnectionServer {
    worker: HostWorker,
    state: Mutex<ServerState>,
}

impl ConnectionServer {
    /// Creates a stopped server.
    #[must_use]
    pub fn new(config: ServerConfig, worker: HostWorker) -> Self {
        Self {
            worker,
            state: Mutex::new(ServerState {
                config: Arc::new(config),
                listening: None,
            }),
        }
    }

    /// Returns the current configuration.
    pub async fn config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.state.lock().await.config)
    }

    /// Binds the configured address and starts accepting.
    ///
    /// Idempotent: when already running, returns
    /// [`StartOutcome::AlreadyRunning`] without opening a second socket.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Bind`] if the address cannot be bound, e.g.
    /// because the port is already in use.
    pub async fn start(&self) -> Result<StartOutcome, BridgeError> {
        let mut state = self.state.lock().await;

        if let Some(listening) = &state.listening {
            if !listening.accept_task.is_finished() {
                tracing::info!(addr = %listening.local_addr, "connection server already running");
                return Ok(StartOutcome::AlreadyRunning(listening.local_addr));
            }
            tracing::warn!("accept loop had exited, rebinding");
            state.listening = None;
        }

        let addr = state.config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BridgeError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let ctx = ConnectionContext {
            gate: AuthGate::new(state.config.token.clone()),
            worker: self.worker.clone(),
        };
        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(
            accept_loop(listener, ctx, shutdown_rx)
                .instrument(tracing::info_span!("connection_server", addr = %local_addr)),
        );

        let auth = if state.config.token.is_some() {
            "token"
        } else {
            "open"
        };
        tracing::info!(addr = %local_addr, auth, "connection server listening");
        state.listening = Some(Listening {
            local_addr,
            shutdown,
            accept_task,
        });
        Ok(StartOutcome::Started(local_addr))
    }

    /// Closes the listener and every accepted connection.
    ///
    /// Safe to call when the server was never started. Returns `true` if
    /// a listener was actually closed. In-flight host calls are not
    /// interrupted; their connections close after responding.
    pub async fn stop(&self) -> bool {
        let listening = self.state.lock().await.listening.take();
        let Some(listening) = listening else {
            return false;
        };

        let _ = listening.shutdown.send(true);
        if let Err(e) = listening.accept_task.await {
            tracing::error!(error = %e, "accept loop terminated abnormally");
        }
        tracing::info!(addr = %listening.local_addr, "connection server stopped");
        true
    }

    /// Stops the server, replaces its configuration and starts it again.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Bind`] if the new address cannot be bound;
    /// the server is left stopped with the new configuration.
    pub async fn restart(&self, config: ServerConfig) -> Result<SocketAddr, BridgeError> {
        self.stop().await;
        self.state.lock().await.config = Arc::new(config);
        self.start().await.map(StartOutcome::addr)
    }

    /// Returns `true` while the accept loop is running.
    pub async fn is_running(&self) -> bool {
        self.state
            .lock()
            .await
            .listening
            .as_ref()
            .is_some_and(|l| !l.accept_task.is_finished())
    }

    /// Returns the bound address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.state
            .lock()
            .await
            .listening
            .as_ref()
            .map(|l| l.local_addr)
    }

    /// Host launch hook: starts the server if autostart is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Bind`] if autostart is on and binding fails.
    pub async fn on_host_launch(&self) -> Result<Option<SocketAddr>, BridgeError> {
        if !self.config().await.autostart {
            tracing::info!("autostart disabled, connection server idle");
            return Ok(None);
        }
        self.start().await.map(|outcome| Some(outcome.addr()))
    }

    /// Host shutdown hook: stops the server.
    pub async fn on_host_shutdown(&self) {
        self.stop().await;
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: ConnectionContext,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let conn_id = uuid::Uuid::new_v4();
                    tracing::info!(%peer, %conn_id, "connection accepted");
                    let span = tracing::info_span!("connection", %conn_id, %peer);
                    let ctx = ctx.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(
                        async move {
                            let handled = run_connection(stream, ctx, shutdown).await;
                            tracing::info!(handled, "connection closed");
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed, closing listener");
                    break;
                }
            },
        }
    }
    drop(listener);
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;
    use crate::host::fake::FakeHost;
    use crate::protocol::{FrameReader, WireResponse, write_frame};
    use serde_json::json;
    use tokio::net::TcpStream;

    fn server(config: ServerConfig) -> ConnectionServer {
        let Ok(worker) = HostWorker::spawn(FakeHost::with_objects(&["Cube"]), 8) else {
            panic!("worker should spawn");
        };
        ConnectionServer::new(config, worker)
    }

    fn ephemeral() -> ServerConfig {
        ServerConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    async fn started(server: &ConnectionServer) -> SocketAddr {
        match server.start().await {
            Ok(StartOutcome::Started(addr)) => addr,
            other => panic!("expected a fresh start, got {other:?}"),
        }
    }

    async fn roundtrip(stream: &mut TcpStream, request: serde_json::Value) -> WireResponse {
        let (reader, mut writer) = stream.split();
        let Ok(()) = write_frame(&mut writer, &request).await else {
            panic!("write failed");
        };
        let mut frames = FrameReader::new(reader);
        let Ok(Some(line)) = frames.next_frame().await else {
            panic!("no response frame");
        };
        let Ok(resp) = serde_json::from_str(&line) else {
            panic!("bad response frame: {line}");
        };
        resp
    }

    #[tokio::test]
    async fn start_twice_reports_already_running() {
        let server = server(ephemeral());
        let addr = started(&server).await;
        assert!(server.is_running().await);

        let second = server.start().await;
        assert!(matches!(second, Ok(StartOutcome::AlreadyRunning(a)) if a == addr));
        assert_eq!(server.local_addr().await, Some(addr));
        assert!(server.stop().await);
    }

    #[tokio::test]
    async fn stop_without_start_is_noop() {
        let server = server(ephemeral());
        assert!(!server.stop().await);
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn bind_collision_is_reported() {
        let Ok(squatter) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(taken) = squatter.local_addr() else {
            panic!("no local addr");
        };
        let server = server(ephemeral().with_port(taken.port()));
        assert!(matches!(server.start().await, Err(BridgeError::Bind { .. })));
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn native_connection_carries_many_commands() {
        let server = server(ephemeral());
        let addr = started(&server).await;
        let Ok(mut stream) = TcpStream::connect(addr).await else {
            panic!("connect failed");
        };

        let first = roundtrip(&mut stream, json!({"type": "select", "name": "Cube"})).await;
        assert_eq!(first.result, Some(json!("Selected 'Cube'")));
        let second = roundtrip(&mut stream, json!({"command": "status"})).await;
        assert!(second.success);
        server.stop().await;
    }

    #[tokio::test]
    async fn stop_closes_accepted_connections_and_listener() {
        let server = server(ephemeral());
        let addr = started(&server).await;
        let Ok(mut stream) = TcpStream::connect(addr).await else {
            panic!("connect failed");
        };
        let _ = roundtrip(&mut stream, json!({"type": "status"})).await;

        assert!(server.stop().await);
        let mut frames = FrameReader::new(&mut stream);
        let closed = tokio::time::timeout(std::time::Duration::from_secs(2), frames.next_frame()).await;
        assert!(matches!(closed, Ok(Ok(None)) | Ok(Err(_))));
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn restart_applies_new_token() {
        let server = server(ephemeral());
        let _ = started(&server).await;

        let Ok(addr) = server.restart(ephemeral().with_token("secret")).await else {
            panic!("restart failed");
        };
        assert_eq!(server.config().await.token.as_deref(), Some("secret"));

        let Ok(mut stream) = TcpStream::connect(addr).await else {
            panic!("connect failed");
        };
        let denied = roundtrip(&mut stream, json!({"type": "status"})).await;
        assert_eq!(denied.error.as_deref(), Some("Unauthorized"));
        let allowed = roundtrip(&mut stream, json!({"type": "status", "token": "secret"})).await;
        assert!(allowed.success);
        server.stop().await;
    }

    #[tokio::test]
    async fn launch_hook_honours_autostart() {
        let idle = server(ephemeral().with_autostart(false));
        assert!(matches!(idle.on_host_launch().await, Ok(None)));
        assert!(!idle.is_running().await);

        let eager = server(ephemeral());
        assert!(matches!(eager.on_host_launch().await, Ok(Some(_))));
        eager.on_host_shutdown().await;
        assert!(!eager.is_running().await);
    }
}
