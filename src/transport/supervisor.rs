//! Connection supervisor.
//!
//! Drives an [`EndpointSelector`] and a [`TransportSession`] through the
//! retry loop until a session opens or the candidates run out.
//!
//! # State Machine
//!
//! ```text
//!            start()
//!   Idle ───────────► Connecting ──Opened──► Open ──Closed/Errored──► Closed
//!                       ▲    │
//!                       │    │ Closed/Errored before open
//!                       │    ▼
//!                     Retrying ──no candidate left──► Exhausted
//! ```
//!
//! Every event produces an explicit [`Transition`] for the caller to act on.
//! Once a session has opened no further candidate is tried; a later failure
//! is terminal and surfaced.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

use super::connector::Connector;
use super::endpoint::EndpointSelector;
use super::session::{KeepAlive, SessionEvent, SessionEventTx, TransportSession};

// ============================================================================
// Constants
// ============================================================================

/// How long a closing session may take to send its close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ============================================================================
// SupervisorState
// ============================================================================

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Not started.
    Idle,
    /// A candidate is being dialled.
    Connecting,
    /// A session is open.
    Open,
    /// The current candidate failed; the next one is about to be dialled.
    Retrying,
    /// Every candidate failed.
    Exhausted,
    /// An open session ended.
    Closed,
    /// Shut down by the owner.
    Shutdown,
}

impl SupervisorState {
    /// Returns `true` for states that only a restart can leave.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exhausted | Self::Closed | Self::Shutdown)
    }
}

// ============================================================================
// Transition
// ============================================================================

/// What happened as a result of a supervisor step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The first candidate is being dialled.
    Connecting {
        /// Candidate URL.
        url: String,
    },
    /// The session opened.
    Opened {
        /// URL of the open session.
        url: String,
    },
    /// A text frame arrived on the open session.
    Received(String),
    /// The previous candidate failed and the next one is being dialled.
    Retrying {
        /// Next candidate URL.
        url: String,
    },
    /// No candidate could be reached.
    Exhausted {
        /// Number of candidates attempted.
        attempts: usize,
    },
    /// The session closed after having been open.
    Closed {
        /// Close reason.
        reason: String,
    },
    /// The session failed after having been open.
    Failed {
        /// Error description.
        reason: String,
    },
    /// Nothing to do; the event belonged to a session already cleaned up.
    Stale,
}

// ============================================================================
// ConnectionSupervisor
// ============================================================================

/// Owns the selector and the current session.
pub struct ConnectionSupervisor {
    selector: EndpointSelector,
    connector: Arc<dyn Connector>,
    keep_alive: KeepAlive,
    events: SessionEventTx,
    session: Option<TransportSession>,
    state: SupervisorState,
}

impl ConnectionSupervisor {
    /// Creates an idle supervisor. Sessions report on `events`.
    #[must_use]
    pub fn new(
        selector: EndpointSelector,
        connector: Arc<dyn Connector>,
        keep_alive: KeepAlive,
        events: SessionEventTx,
    ) -> Self {
        Self {
            selector,
            connector,
            keep_alive,
            events,
            session: None,
            state: SupervisorState::Idle,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    /// The endpoint selector.
    #[inline]
    #[must_use]
    pub const fn selector(&self) -> &EndpointSelector {
        &self.selector
    }

    /// Id of the current session, if any.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(TransportSession::id)
    }

    /// Dials the first candidate.
    ///
    /// Has no effect unless the supervisor is idle.
    pub fn start(&mut self) -> Transition {
        if self.state != SupervisorState::Idle {
            debug!(state = ?self.state, "Supervisor already started");
            return Transition::Stale;
        }

        let url = self.open_current();
        Transition::Connecting { url }
    }

    /// Abandons any session and scans the candidates again from the start.
    pub fn restart(&mut self) -> Transition {
        self.end_session();
        self.selector.reset();
        self.state = SupervisorState::Idle;
        self.start()
    }

    /// Applies a session event.
    pub fn on_event(&mut self, id: SessionId, event: SessionEvent) -> Transition {
        let Some(session) = self.session.as_mut().filter(|s| s.id() == id) else {
            trace!(%id, ?event, "Ignoring event from stale session");
            return Transition::Stale;
        };

        match event {
            SessionEvent::Opened => {
                session.mark_valid();
                self.state = SupervisorState::Open;
                let url = session.url().to_string();
                info!(%url, "WebSocket connection successful");
                Transition::Opened { url }
            }

            SessionEvent::Received(text) => {
                if session.is_valid() {
                    Transition::Received(text)
                } else {
                    warn!(%id, "Frame received before open");
                    Transition::Stale
                }
            }

            SessionEvent::Closed { reason } => {
                if session.is_valid() || self.selector.is_exhausted() {
                    self.end_session();
                    self.state = SupervisorState::Closed;
                    info!(%reason, "Connection was closed");
                    Transition::Closed { reason }
                } else {
                    // Some platforms close a never-opened socket without an
                    // error event; treat it as one.
                    debug!(%id, "Closed before open, raising error");
                    self.on_error(reason)
                }
            }

            SessionEvent::Errored { reason } => self.on_error(reason),

            SessionEvent::ConstructionFailed { reason } => {
                warn!(%reason, "WebSocket connection failed");
                self.end_session();
                self.state = SupervisorState::Exhausted;
                Transition::Exhausted {
                    attempts: self.selector.attempted(),
                }
            }
        }
    }

    /// Sends a text frame on the open session.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] unless a session is open.
    pub fn send(&self, text: String) -> Result<()> {
        match (&self.session, self.state) {
            (Some(session), SupervisorState::Open) => session.send(text),
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Closes the current session gracefully and stops.
    pub async fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close(CLOSE_GRACE).await;
        }
        self.state = SupervisorState::Shutdown;
        debug!("Supervisor shut down");
    }

    /// Error path shared by errored and never-opened closed sessions.
    fn on_error(&mut self, reason: String) -> Transition {
        let was_valid = self.session.as_ref().is_some_and(TransportSession::is_valid);

        if was_valid || self.selector.is_exhausted() {
            self.end_session();
            self.state = SupervisorState::Closed;
            warn!(%reason, "Connection had an error");
            return Transition::Failed { reason };
        }

        self.end_session();

        if self.selector.advance() {
            self.state = SupervisorState::Retrying;
            debug!(%reason, "Candidate failed, moving on to the next port");
            let url = self.open_current();
            Transition::Retrying { url }
        } else {
            self.state = SupervisorState::Exhausted;
            let attempts = self.selector.attempted();
            warn!(attempts, "Unable to connect, is the print service running?");
            Transition::Exhausted { attempts }
        }
    }

    /// Opens a session on the candidate under the cursor.
    fn open_current(&mut self) -> String {
        let url = self.selector.current_url();
        self.session = Some(TransportSession::open(
            Arc::clone(&self.connector),
            url.clone(),
            self.keep_alive.clone(),
            self.events.clone(),
        ));
        self.state = SupervisorState::Connecting;
        url
    }

    /// Cleans up and drops the current session.
    fn end_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.cleanup();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
