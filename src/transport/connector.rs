//! Socket construction seam.
//!
//! A [`Connector`] turns a candidate URL into an open WebSocket. The default
//! [`TungsteniteConnector`] dials the daemon with `tokio-tungstenite`; tests
//! plug in an in-memory connector instead.

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;
use std::result::Result as StdResult;

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use crate::error::Result;

// ============================================================================
// Socket
// ============================================================================

/// A bidirectional WebSocket message stream.
///
/// Blanket-implemented for anything that is both a message stream and a
/// message sink, such as `tokio_tungstenite::WebSocketStream`.
pub trait Socket:
    Stream<Item = StdResult<Message, WsError>> + Sink<Message, Error = WsError> + Send
{
}

impl<T> Socket for T where
    T: Stream<Item = StdResult<Message, WsError>> + Sink<Message, Error = WsError> + Send
{
}

/// Type-erased socket handed from a [`Connector`] to a session.
pub type BoxSocket = Pin<Box<dyn Socket>>;

// ============================================================================
// Connector
// ============================================================================

/// Opens WebSocket connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `url` and completes the WebSocket handshake.
    ///
    /// # Errors
    ///
    /// Any error means this candidate did not pan out.
    async fn connect(&self, url: &str) -> Result<BoxSocket>;
}

/// Default connector backed by `tokio_tungstenite::connect_async`.
///
/// `wss://` candidates need the `native-tls` feature; without it the
/// handshake fails and the candidate is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<BoxSocket> {
        let (stream, response) = connect_async(url).await?;
        debug!(url, status = %response.status(), "WebSocket handshake completed");
        Ok(Box::pin(stream))
    }
}
