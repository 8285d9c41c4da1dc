//! Outbound request message.
//!
//! # Format
//!
//! ```json
//! {
//!   "method": "findPrinter",
//!   "params": ["zebra"],
//!   "callback": "qzDoneFinding",
//!   "init": false
//! }
//! ```
//!
//! Signed requests carry the opaque signature directly in front of the JSON
//! object on the same text frame.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::identifiers::CallbackName;

// ============================================================================
// OutboundRequest
// ============================================================================

/// A call from the bridge to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundRequest {
    /// Remote operation name.
    pub method: String,

    /// Positional parameters.
    pub params: Vec<Value>,

    /// Name the daemon echoes back with the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackName>,

    /// Marks a manifest-bootstrap call.
    pub init: bool,
}

impl OutboundRequest {
    /// Creates a request.
    #[inline]
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        params: Vec<Value>,
        callback: Option<CallbackName>,
        init: bool,
    ) -> Self {
        Self {
            method: method.into(),
            params,
            callback,
            init,
        }
    }

    /// Creates the manifest request carrying the site certificate.
    #[inline]
    #[must_use]
    pub fn manifest(method: impl Into<String>, certificate: impl Into<String>) -> Self {
        Self::new(method, vec![Value::String(certificate.into())], None, false)
    }
}

// ============================================================================
// Tests
// ============================================================================
