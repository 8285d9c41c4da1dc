//! Error types for the print bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use qz_bridge::{Argument, Result};
//!
//! fn example(remote: &qz_bridge::Remote) -> Result<()> {
//!     remote.call("findPrinter", vec![Argument::value("zebra")])?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::NoConnection`] |
//! | Protocol | [`Error::Protocol`], [`Error::Remote`], [`Error::UnknownMethod`] |
//! | Collaborators | [`Error::Signing`], [`Error::Certificate`], [`Error::CallbackFault`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bridge options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// A candidate URL could not be turned into a socket.
    #[error("Invalid endpoint URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed after the session had opened.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// WebSocket connection closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Every endpoint candidate was tried without success.
    #[error("No connection after {attempts} attempt(s)")]
    NoConnection {
        /// Number of candidates attempted.
        attempts: usize,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The daemon answered with an `error` field.
    #[error("Remote error: {message}")]
    Remote {
        /// Error text reported by the daemon.
        message: String,
    },

    /// No callable with this name (or arity) exists on the remote surface.
    #[error("Unknown method: {name}")]
    UnknownMethod {
        /// Name that was looked up, e.g. `findPrinter_2`.
        name: String,
    },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// The signer failed to produce a signature.
    #[error("Signing failed: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// The certificate supplier failed.
    #[error("Certificate unavailable: {message}")]
    Certificate {
        /// Description of the failure.
        message: String,
    },

    /// A user callback returned an error or panicked.
    #[error("Callback {callback} failed: {message}")]
    CallbackFault {
        /// Callback name.
        callback: String,
        /// Failure description.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a no-connection error.
    #[inline]
    pub fn no_connection(attempts: usize) -> Self {
        Self::NoConnection { attempts }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates an unknown method error.
    #[inline]
    pub fn unknown_method(name: impl Into<String>) -> Self {
        Self::UnknownMethod { name: name.into() }
    }

    /// Creates a signing error.
    #[inline]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a certificate error.
    #[inline]
    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate {
            message: message.into(),
        }
    }

    /// Creates a callback fault.
    #[inline]
    pub fn callback_fault(callback: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallbackFault {
            callback: callback.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::NoConnection { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error came from the wire protocol.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::Remote { .. } | Self::Json(_)
        )
    }

    /// Returns `true` if a fresh deploy may succeed.
    ///
    /// Connection loss and exhaustion are worth retrying once the daemon is
    /// (re)started; configuration and protocol errors are not.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::NoConnection { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
