//! Short-lived socket client for the relay hop.
//!
//! Every call opens a fresh connection, writes one frame, reads one
//! frame and closes. Nothing is kept between calls.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::protocol::{FrameReader, WireResponse, write_frame};

/// Sends single commands to the connection server.
#[derive(Debug, Clone)]
pub struct RelayClient {
    target: SocketAddr,
    timeout: Duration,
    token: Option<String>,
}

impl RelayClient {
    /// Creates a client for `target` bounding each hop by `timeout`.
    #[must_use]
    pub const fn new(target: SocketAddr, timeout: Duration) -> Self {
        Self {
            target,
            timeout,
            token: None,
        }
    }

    /// Builds a client from the relay configuration.
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            target: config.target_addr,
            timeout: config.timeout,
            token: config.token.clone(),
        }
    }

    /// Sets the token injected into commands that carry none.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the token injected into commands that carry none.
    #[must_use]
    pub fn default_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Sends `record` as one frame and waits for one response frame.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Unavailable`] if the connection is refused,
    /// - [`RelayError::TimedOut`] if connecting or awaiting the response
    ///   exceeds the timeout,
    /// - [`RelayError::Protocol`] if the server closes without answering
    ///   or answers with a non-response line,
    /// - [`RelayError::Io`] for any other socket failure.
    pub async fn send(&self, record: &Map<String, Value>) -> Result<WireResponse, RelayError> {
        let mut stream = match timeout(self.timeout, TcpStream::connect(self.target)).await {
            Err(_) => return Err(self.timed_out()),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                tracing::warn!(target_addr = %self.target, "connection server not listening");
                return Err(RelayError::Unavailable(self.target));
            }
            Ok(Err(e)) => return Err(RelayError::Io(e)),
            Ok(Ok(stream)) => stream,
        };

        let exchange = async {
            let (reader, mut writer) = stream.split();
            write_frame(&mut writer, record).await?;
            FrameReader::new(reader).next_frame().await
        };

        let line = match timeout(self.timeout, exchange).await {
            Err(_) => {
                tracing::warn!(target_addr = %self.target, "connection server timed out");
                return Err(self.timed_out());
            }
            Ok(result) => result?,
        };

        let line = line.ok_or_else(|| {
            RelayError::Protocol("connection closed before a response arrived".to_string())
        })?;
        serde_json::from_str(&line)
            .map_err(|e| RelayError::Protocol(format!("invalid response frame: {e}")))
    }

    fn timed_out(&self) -> RelayError {
        RelayError::TimedOut(self.timeout.as_millis())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn status_record() -> Map<String, Value> {
        let Value::Object(map) = json!({"type": "status"}) else {
            panic!("object literal");
        };
        map
    }

    async fn listener() -> (TcpListener, SocketAddr) {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        (listener, addr)
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let (listener, addr) = listener().await;
        drop(listener);
        let client = RelayClient::new(addr, Duration::from_secs(1));
        assert!(matches!(
            client.send(&status_record()).await,
            Err(RelayError::Unavailable(a)) if a == addr
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (listener, addr) = listener().await;
        let hold = tokio::spawn(async move {
            let accepted = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(accepted);
        });
        let client = RelayClient::new(addr, Duration::from_millis(100));
        assert!(matches!(
            client.send(&status_record()).await,
            Err(RelayError::TimedOut(100))
        ));
        hold.abort();
    }

    #[tokio::test]
    async fn early_close_is_protocol_error() {
        let (listener, addr) = listener().await;
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let _ = FrameReader::new(&mut stream).next_frame().await;
                let _ = stream.write_all(b"{\"success\":true").await;
            }
        });
        let client = RelayClient::new(addr, Duration::from_secs(1));
        assert!(matches!(
            client.send(&status_record()).await,
            Err(RelayError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn reads_single_response_frame() {
        let (listener, addr) = listener().await;
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let _ = FrameReader::new(&mut stream).next_frame().await;
                let _ = stream.write_all(b"{\"success\":true,\"result\":\"hi\"}\n").await;
            }
        });
        let client = RelayClient::new(addr, Duration::from_secs(1));
        let Ok(resp) = client.send(&status_record()).await else {
            panic!("send failed");
        };
        assert_eq!(resp.result, Some(json!("hi")));
    }
}
