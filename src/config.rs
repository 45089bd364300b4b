//! Bridge configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Both configs are read once at process
//! start and are immutable afterwards; changing them requires restarting
//! the component that owns them.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Well-known port the connection server listens on by default.
pub const DEFAULT_PORT: u16 = 9999;

/// Default address of the HTTP relay.
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:21337";

/// Connection server configuration.
///
/// Constructed at startup via [`ServerConfig::from_env`] or the builder
/// methods below, then shared read-only with every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind. Loopback unless explicitly overridden.
    pub host: IpAddr,

    /// TCP port to listen on (`0` asks the OS for an ephemeral port).
    pub port: u16,

    /// Shared secret every command must carry. `None` means open mode.
    pub token: Option<String>,

    /// Whether the server starts as soon as the host launches.
    pub autostart: bool,

    /// Capacity of the serial host worker's submission queue.
    pub worker_queue: usize,
}

impl ServerConfig {
    /// Creates a config bound to `host:port` with no token and autostart on.
    #[must_use]
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            host,
            port,
            ..Self::default()
        }
    }

    /// Sets the shared-secret token. Empty strings disable authorization.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into()).filter(|t| !t.is_empty());
        self
    }

    /// Sets the listening port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the autostart flag.
    #[must_use]
    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Returns the socket address the server binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SCENE_LINK_HOST` | `127.0.0.1` |
    /// | `SCENE_LINK_PORT` | `9999` |
    /// | `SCENE_LINK_TOKEN` | unset (open mode) |
    /// | `SCENE_LINK_AUTOSTART` | `true` |
    /// | `SCENE_LINK_WORKER_QUEUE` | `64` |
    ///
    /// # Errors
    ///
    /// Returns an error if `SCENE_LINK_HOST` is set but is not a valid IP
    /// address.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let host: IpAddr = match std::env::var("SCENE_LINK_HOST") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.host,
        };

        Ok(Self {
            host,
            port: parse_env("SCENE_LINK_PORT", defaults.port),
            token: optional_env("SCENE_LINK_TOKEN"),
            autostart: parse_env_bool("SCENE_LINK_AUTOSTART", defaults.autostart),
            worker_queue: parse_env("SCENE_LINK_WORKER_QUEUE", defaults.worker_queue).max(1),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            token: None,
            autostart: true,
            worker_queue: 64,
        }
    }
}

/// HTTP relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address the relay's HTTP server binds to.
    pub listen_addr: SocketAddr,

    /// Address of the connection server every request is forwarded to.
    pub target_addr: SocketAddr,

    /// Bound on the connect and on the response wait of each hop.
    pub timeout: Duration,

    /// Token injected into forwarded commands that do not carry one.
    pub token: Option<String>,
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Reads `RELAY_LISTEN_ADDR`, `RELAY_TARGET_ADDR`, `RELAY_TIMEOUT_MS`
    /// and `RELAY_TOKEN`, falling back to loopback defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if either address variable is set but cannot be
    /// parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("RELAY_LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_RELAY_ADDR.to_string())
            .parse()?;

        let target_addr: SocketAddr = std::env::var("RELAY_TARGET_ADDR")
            .unwrap_or_else(|_| format!("127.0.0.1:{DEFAULT_PORT}"))
            .parse()?;

        let timeout_ms = parse_env("RELAY_TIMEOUT_MS", 3_000_u64).max(1);

        Ok(Self {
            listen_addr,
            target_addr,
            timeout: Duration::from_millis(timeout_ms),
            token: optional_env("RELAY_TOKEN"),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key)
        .ok()
        .map(|v| v.to_ascii_lowercase())
        .as_deref()
    {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

/// Returns the variable's value, treating unset and empty alike.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_loopback_on_well_known_port() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9999");
        assert!(config.token.is_none());
        assert!(config.autostart);
    }

    #[test]
    fn empty_token_means_open_mode() {
        let config = ServerConfig::default().with_token("");
        assert!(config.token.is_none());

        let config = ServerConfig::default().with_token("s3cret");
        assert_eq!(config.token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn builder_overrides_port_and_autostart() {
        let config = ServerConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .with_port(4242)
            .with_autostart(false);
        assert_eq!(config.port, 4242);
        assert!(!config.autostart);
    }
}
