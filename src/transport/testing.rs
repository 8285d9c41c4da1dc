//! In-memory connector for tests.
//!
//! URLs listed as accepting get a duplex-backed WebSocket pair; the server
//! half is handed to the test. URLs listed as hanging never resolve. Every
//! other URL is refused.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;

use crate::error::{Error, Result};

use super::connector::{BoxSocket, Connector};

const DUPLEX_BUFFER: usize = 64 * 1024;

// ============================================================================
// ScriptedConnector
// ============================================================================

/// Connector that accepts, hangs or refuses per URL and records attempts.
pub(crate) struct ScriptedConnector {
    accepting: Vec<String>,
    hanging: Vec<String>,
    attempts: Mutex<Vec<String>>,
    servers: mpsc::UnboundedSender<ServerSide>,
}

impl ScriptedConnector {
    /// Creates a connector accepting only `accepting`.
    pub(crate) fn new(accepting: &[&str]) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        Self::with_hanging(accepting, &[])
    }

    /// Creates a connector accepting `accepting` and never answering `hanging`.
    pub(crate) fn with_hanging(
        accepting: &[&str],
        hanging: &[&str],
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accepting: accepting.iter().map(|s| (*s).to_string()).collect(),
            hanging: hanging.iter().map(|s| (*s).to_string()).collect(),
            attempts: Mutex::new(Vec::new()),
            servers,
        });
        (connector, rx)
    }

    /// URLs dialled so far, in order.
    pub(crate) fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<BoxSocket> {
        self.attempts.lock().push(url.to_string());

        if self.hanging.iter().any(|u| u == url) {
            std::future::pending::<()>().await;
        }

        if !self.accepting.iter().any(|u| u == url) {
            return Err(Error::connection(format!("{url}: connection refused")));
        }

        let (client, server) = tokio::io::duplex(DUPLEX_BUFFER);
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;

        let _ = self.servers.send(ServerSide {
            url: url.to_string(),
            socket: server,
        });

        Ok(Box::pin(client))
    }
}

// ============================================================================
// ServerSide
// ============================================================================

/// Daemon end of an in-memory connection.
pub(crate) struct ServerSide {
    pub(crate) url: String,
    socket: WebSocketStream<DuplexStream>,
}

impl ServerSide {
    /// Next text frame, or `None` once the client is gone.
    pub(crate) async fn recv_text(&mut self) -> Option<String> {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.as_str().to_owned()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => {}
            }
        }
    }

    /// Reads until the client's close frame, returning `false` if the
    /// connection ended without one.
    pub(crate) async fn recv_close(&mut self) -> bool {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return false,
            }
        }
    }

    /// Next protocol message, skipping keep-alive pings and any signature
    /// prefix before the JSON object.
    pub(crate) async fn recv_json(&mut self) -> Option<Value> {
        loop {
            let text = self.recv_text().await?;
            if text == "ping" {
                continue;
            }
            let start = text.find('{')?;
            return serde_json::from_str(&text[start..]).ok();
        }
    }

    /// Sends a text frame to the client.
    pub(crate) async fn send_text(&mut self, text: &str) {
        let _ = self.socket.send(Message::Text(text.to_string().into())).await;
    }

    /// Sends a JSON message to the client.
    pub(crate) async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    /// Closes the connection with a close frame.
    pub(crate) async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }

    /// Drops the connection without a closing handshake.
    pub(crate) fn reset(self) {
        drop(self.socket);
    }
}
