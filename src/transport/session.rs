//! One socket attempt.
//!
//! A [`TransportSession`] owns a spawned task that connects through a
//! [`Connector`], pumps frames, and sends keep-alive pings. Everything the
//! task observes is reported as a [`SessionEvent`] on the supervisor's
//! channel, tagged with the session id. Failures never surface as errors
//! from [`TransportSession::open`].
//!
//! # Cleanup
//!
//! The keep-alive ticker lives inside the session task, so aborting the task
//! in [`TransportSession::cleanup`] cancels the timer and releases the socket
//! in one step. Cleanup is idempotent and also runs on drop.
//!
//! [`TransportSession::close`] instead lets the task send a close frame and
//! exit on its own, aborting it only if that takes longer than the grace
//! period.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

use super::connector::Connector;

// ============================================================================
// Types
// ============================================================================

/// Sender half of the channel sessions report on.
pub type SessionEventTx = mpsc::UnboundedSender<(SessionId, SessionEvent)>;

/// Receiver half of the channel sessions report on.
pub type SessionEventRx = mpsc::UnboundedReceiver<(SessionId, SessionEvent)>;

/// Lifecycle event of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The WebSocket handshake completed.
    Opened,
    /// A text frame arrived.
    Received(String),
    /// The socket closed.
    Closed {
        /// Close reason, possibly empty.
        reason: String,
    },
    /// The socket failed, including failure to connect.
    Errored {
        /// Error description.
        reason: String,
    },
    /// No socket could be constructed for the URL at all.
    ConstructionFailed {
        /// Error description.
        reason: String,
    },
}

/// Keep-alive settings for an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAlive {
    /// Time between pings.
    pub interval: Duration,
    /// Sentinel text sent on each tick.
    pub payload: String,
}

/// Commands from the supervisor to the session task.
enum SessionCommand {
    /// Write a text frame.
    Send(String),
    /// Close the socket gracefully.
    Close,
}

// ============================================================================
// TransportSession
// ============================================================================

/// Handle to one socket attempt.
#[derive(Debug)]
pub struct TransportSession {
    id: SessionId,
    url: String,
    valid: bool,
    command_tx: Option<mpsc::UnboundedSender<SessionCommand>>,
    task: Option<JoinHandle<()>>,
}

impl TransportSession {
    /// Starts an attempt on `url`.
    ///
    /// Returns immediately. If the URL cannot be parsed the session is born
    /// in an error state and a [`SessionEvent::ConstructionFailed`] is queued.
    pub fn open(
        connector: Arc<dyn Connector>,
        url: impl Into<String>,
        keep_alive: KeepAlive,
        events: SessionEventTx,
    ) -> Self {
        let id = SessionId::generate();
        let url = url.into();

        if let Err(e) = Url::parse(&url) {
            let reason = Error::invalid_url(&url, e).to_string();
            warn!(%id, %reason, "WebSocket could not be constructed");
            let _ = events.send((id, SessionEvent::ConstructionFailed { reason }));
            return Self {
                id,
                url,
                valid: false,
                command_tx: None,
                task: None,
            };
        }

        debug!(%id, %url, "Attempting connection");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(
            id,
            connector,
            url.clone(),
            keep_alive,
            command_rx,
            events,
        ));

        Self {
            id,
            url,
            valid: false,
            command_tx: Some(command_tx),
            task: Some(task),
        }
    }

    /// Session id carried by this session's events.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// URL this session dialled.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `true` once the session has opened.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Records that the session opened.
    #[inline]
    pub fn mark_valid(&mut self) {
        self.valid = true;
    }

    /// Returns `true` until [`cleanup`](Self::cleanup) has run.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the session task is gone.
    pub fn send(&self, text: String) -> Result<()> {
        self.command_tx
            .as_ref()
            .ok_or(Error::ConnectionClosed)?
            .send(SessionCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the socket with a close frame and waits for the task to exit.
    ///
    /// The task is aborted if it has not finished within `grace`.
    pub async fn close(&mut self, grace: Duration) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(SessionCommand::Close);
        }

        let Some(mut task) = self.task.take() else {
            return;
        };

        if timeout(grace, &mut task).await.is_err() {
            warn!(id = %self.id, "Session did not close in time, aborting");
            task.abort();
        } else {
            trace!(id = %self.id, "Session closed");
        }
    }

    /// Cancels the keep-alive timer and releases the socket.
    pub fn cleanup(&mut self) {
        self.command_tx = None;
        if let Some(task) = self.task.take() {
            task.abort();
            trace!(id = %self.id, "Session cleaned up");
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ============================================================================
// Session Task
// ============================================================================

/// Connects, then pumps frames until the socket ends or the session is told
/// to close.
async fn run_session(
    id: SessionId,
    connector: Arc<dyn Connector>,
    url: String,
    keep_alive: KeepAlive,
    mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    events: SessionEventTx,
) {
    let socket = match connector.connect(&url).await {
        Ok(socket) => socket,
        Err(e) => {
            debug!(%id, %url, error = %e, "Connection attempt failed");
            let _ = events.send((id, SessionEvent::Errored {
                reason: e.to_string(),
            }));
            return;
        }
    };

    if events.send((id, SessionEvent::Opened)).is_err() {
        return;
    }

    let (mut ws_write, mut ws_read) = socket.split();
    let mut ticker = interval_at(Instant::now() + keep_alive.interval, keep_alive.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let event = SessionEvent::Received(text.as_str().to_owned());
                        if events.send((id, event)).is_err() {
                            break None;
                        }
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_owned())
                            .unwrap_or_default();
                        break Some(SessionEvent::Closed { reason });
                    }

                    Some(Err(e)) => {
                        break Some(SessionEvent::Errored { reason: e.to_string() });
                    }

                    None => {
                        break Some(SessionEvent::Closed { reason: "stream ended".to_string() });
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            _ = ticker.tick() => {
                trace!(%id, "Sending keep-alive");
                let ping = Message::Text(keep_alive.payload.clone().into());
                if let Err(e) = ws_write.send(ping).await {
                    break Some(SessionEvent::Errored { reason: e.to_string() });
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(SessionCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            break Some(SessionEvent::Errored { reason: e.to_string() });
                        }
                    }

                    Some(SessionCommand::Close) | None => {
                        let _ = ws_write.close().await;
                        break None;
                    }
                }
            }
        }
    };

    if let Some(event) = outcome {
        debug!(%id, ?event, "Session ended");
        let _ = events.send((id, event));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::testing::ScriptedConnector;

    const INTERVAL: Duration = Duration::from_secs(60);

    fn keep_alive() -> KeepAlive {
        KeepAlive {
            interval: INTERVAL,
            payload: "ping".to_string(),
        }
    }

    #[tokio::test]
    async fn test_invalid_url_reports_construction_failure() {
        let (connector, _servers) = ScriptedConnector::new(&[]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = TransportSession::open(connector.clone(), "ws://bad host:1", keep_alive(), tx);

        let (id, event) = rx.recv().await.expect("event");
        assert_eq!(id, session.id());
        assert!(matches!(event, SessionEvent::ConstructionFailed { .. }));
        assert!(!session.is_active());
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_refused_connection_reports_error() {
        let (connector, _servers) = ScriptedConnector::new(&[]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = TransportSession::open(connector, "ws://localhost:8182", keep_alive(), tx);

        let (id, event) = rx.recv().await.expect("event");
        assert_eq!(id, session.id());
        assert!(matches!(event, SessionEvent::Errored { .. }));
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let url = "ws://localhost:8182";
        let (connector, mut servers) = ScriptedConnector::new(&[url]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = TransportSession::open(connector, url, keep_alive(), tx);
        assert_eq!(rx.recv().await.expect("event").1, SessionEvent::Opened);

        let mut server = servers.recv().await.expect("server side");
        session.send("hello".to_string()).expect("send");
        assert_eq!(server.recv_text().await.as_deref(), Some("hello"));

        server.send_text("world").await;
        assert_eq!(
            rx.recv().await.expect("event").1,
            SessionEvent::Received("world".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_stops_after_cleanup() {
        let url = "ws://localhost:8182";
        let (connector, mut servers) = ScriptedConnector::new(&[url]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut session = TransportSession::open(connector, url, keep_alive(), tx);
        assert_eq!(rx.recv().await.expect("event").1, SessionEvent::Opened);
        let mut server = servers.recv().await.expect("server side");

        tokio::time::sleep(INTERVAL * 3 + INTERVAL / 2).await;
        session.cleanup();
        session.cleanup();
        tokio::time::sleep(INTERVAL * 5).await;

        let mut pings = 0;
        while let Some(text) = server.recv_text().await {
            assert_eq!(text, "ping");
            pings += 1;
        }
        assert_eq!(pings, 3);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_remote_close_is_reported() {
        let url = "ws://localhost:8182";
        let (connector, mut servers) = ScriptedConnector::new(&[url]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _session = TransportSession::open(connector, url, keep_alive(), tx);
        assert_eq!(rx.recv().await.expect("event").1, SessionEvent::Opened);

        let server = servers.recv().await.expect("server side");
        server.close().await;

        let (_, event) = rx.recv().await.expect("event");
        assert!(matches!(
            event,
            SessionEvent::Closed { .. } | SessionEvent::Errored { .. }
        ));
    }

    #[tokio::test]
    async fn test_close_sends_close_frame() {
        let url = "ws://localhost:8182";
        let (connector, mut servers) = ScriptedConnector::new(&[url]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut session = TransportSession::open(connector, url, keep_alive(), tx);
        assert_eq!(rx.recv().await.expect("event").1, SessionEvent::Opened);
        let mut server = servers.recv().await.expect("server side");

        session.close(Duration::from_secs(5)).await;

        assert!(server.recv_close().await);
        assert!(!session.is_active());
        assert!(session.send("late".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_close_before_connect_aborts_after_grace() {
        let url = "ws://localhost:8182";
        let (connector, _servers) = ScriptedConnector::with_hanging(&[], &[url]);
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut session = TransportSession::open(connector, url, keep_alive(), tx);
        session.close(Duration::from_millis(50)).await;

        assert!(!session.is_active());
    }
}
