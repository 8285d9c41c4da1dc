//! Inbound message types.
//!
//! The daemon sends one JSON object per text frame:
//!
//! ```json
//! { "method": "getVersion", "callback": "setupMethods", "result": "2.0.1" }
//! { "method": "listMessages", "result": [{ "name": "print", "parameters": 0, "returns": "void" }] }
//! { "error": "Printer not found" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::identifiers::CallbackName;

// ============================================================================
// InboundMessage
// ============================================================================

/// Raw message as it arrives on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    /// Operation the message answers.
    #[serde(default)]
    pub method: Option<String>,

    /// Callback name echoed from the request.
    #[serde(default)]
    pub callback: Option<CallbackName>,

    /// Result value, often string-encoded.
    #[serde(default)]
    pub result: Option<Value>,

    /// Error text; when present the rest of the message is ignored.
    #[serde(default)]
    pub error: Option<Value>,

    /// Echo of the request's bootstrap flag.
    #[serde(default)]
    pub init: bool,
}

// ============================================================================
// MethodDescriptor
// ============================================================================

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MethodDescriptor {
    /// Operation name.
    pub name: String,

    /// Number of positional parameters.
    #[serde(rename = "parameters")]
    pub parameter_count: usize,

    /// Declared return type, informational only.
    #[serde(rename = "returns", default)]
    pub return_type: String,
}

// ============================================================================
// Inbound
// ============================================================================

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The capability manifest; consumed internally.
    Manifest(Vec<MethodDescriptor>),
    /// A response to a call.
    Response(Response),
}

/// A normalised response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Operation the response answers.
    pub method: Option<String>,
    /// Callback to run.
    pub callback: Option<CallbackName>,
    /// Whether the request was a bootstrap call.
    pub init: bool,
    /// Whether `callback` is the bootstrap callback.
    pub bootstrap: bool,
    /// Normalised result.
    pub payload: Payload,
}

// ============================================================================
// Payload
// ============================================================================

/// Normalised result handed to callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No result (absent or null).
    Empty,
    /// Unwrapped value; used for bootstrap results that become constants.
    Value(Value),
    /// Callback arguments.
    Args(Vec<Value>),
    /// Result of `getException`.
    Exception(RemoteException),
}

impl Payload {
    /// Arguments for the callback.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        match self {
            Self::Args(args) => args,
            Self::Value(value) => std::slice::from_ref(value),
            Self::Empty | Self::Exception(_) => &[],
        }
    }

    /// First argument, if any.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&Value> {
        self.args().first()
    }

    /// The remote exception, for `getException` results.
    #[inline]
    #[must_use]
    pub fn exception(&self) -> Option<&RemoteException> {
        match self {
            Self::Exception(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` when there is nothing to report.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty | Self::Value(Value::Null))
    }

    /// Collapses the payload into a single JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Value(value) => value,
            Self::Args(args) => Value::Array(args),
            Self::Exception(e) => Value::String(e.message),
        }
    }
}

// ============================================================================
// RemoteException
// ============================================================================

/// Exception object reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteException {
    message: String,
}

impl RemoteException {
    /// Wraps an exception message.
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The exception's message.
    #[inline]
    #[must_use]
    pub fn localized_message(&self) -> &str {
        &self.message
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_inbound_defaults() {
        let message: InboundMessage = serde_json::from_str("{}").expect("parse");
        assert!(message.method.is_none());
        assert!(message.callback.is_none());
        assert!(message.result.is_none());
        assert!(!message.init);
    }

    #[test]
    fn test_descriptor_wire_names() {
        let descriptor: MethodDescriptor =
            serde_json::from_value(json!({"name": "foo", "parameters": 1, "returns": "void"}))
                .expect("parse");
        assert_eq!(descriptor.name, "foo");
        assert_eq!(descriptor.parameter_count, 1);
        assert_eq!(descriptor.return_type, "void");
    }

    #[test]
    fn test_payload_args() {
        assert!(Payload::Empty.args().is_empty());
        assert_eq!(Payload::Value(json!(1)).args(), &[json!(1)]);
        assert_eq!(Payload::Args(vec![json!("a"), json!("b")]).first(), Some(&json!("a")));
        assert!(Payload::Value(Value::Null).is_empty());
    }

    #[test]
    fn test_exception_accessor() {
        let payload = Payload::Exception(RemoteException::new("Printer not found"));
        assert_eq!(
            payload.exception().map(RemoteException::localized_message),
            Some("Printer not found")
        );
        assert_eq!(payload.into_value(), json!("Printer not found"));
    }
}
