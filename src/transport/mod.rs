//! WebSocket transport layer.
//!
//! This module finds and maintains the connection to the print daemon.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                       ┌──────────────────┐
//! │ ConnectionSupervisor │                       │  Print daemon    │
//! │  EndpointSelector    │       WebSocket       │                  │
//! │  → TransportSession  │◄─────────────────────►│  wss://host:8181 │
//! │    (keep-alive)      │   scheme://host:port  │  ws://host:8182  │
//! └──────────────────────┘                       └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionSupervisor::start` - Dial the first candidate
//! 2. `TransportSession` reports `Opened` or fails
//! 3. Failure before open - advance to the next port and retry
//! 4. Open - keep-alive pings until the session ends
//! 5. Failure after open - surfaced, never retried automatically
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connector` | Socket construction seam |
//! | `endpoint` | Candidate matrix and cursor |
//! | `session` | One socket attempt and its keep-alive |
//! | `supervisor` | Retry state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Socket construction seam.
pub mod connector;

/// Endpoint candidates and selector.
pub mod endpoint;

/// One socket attempt.
pub mod session;

/// Retry state machine.
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use connector::{BoxSocket, Connector, Socket, TungsteniteConnector};
pub use endpoint::{EndpointCandidate, EndpointSelector, Scheme, SelectorCursor};
pub use session::{KeepAlive, SessionEvent, SessionEventRx, SessionEventTx, TransportSession};
pub use supervisor::{ConnectionSupervisor, SupervisorState, Transition};
