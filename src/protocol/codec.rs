//! Message codec.
//!
//! Encodes [`OutboundRequest`]s and decides whether they need a signature;
//! decodes inbound frames and normalises their loosely typed results.
//!
//! # Result Normalisation
//!
//! The daemon encodes most results as strings. A string result goes
//! through these steps in order:
//!
//! | Step | Input | Output |
//! |------|-------|--------|
//! | unescape | `%5C`, `%22` | `\`, `"` |
//! | boolean | `"true"` / `"false"` | `true` / `false` |
//! | nested JSON | `"[...]"` | parsed array |
//! | null | `"null"` | `null` |
//!
//! Then, unless the message answers a bootstrap call, a non-null result that
//! is not already an array becomes a one-element argument list.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::identifiers::CallbackName;

use super::message::{Inbound, InboundMessage, MethodDescriptor, Payload, RemoteException, Response};
use super::request::OutboundRequest;

// ============================================================================
// Constants
// ============================================================================

/// Method whose result is wrapped as a [`RemoteException`].
const EXCEPTION_METHOD: &str = "getException";

// ============================================================================
// Encoded
// ============================================================================

/// Whether an encoded request must be signed before transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signing {
    /// Send as is.
    Unsigned,
    /// Prepend a signature from the signer.
    Required,
}

/// An encoded request ready for transmission or signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// JSON text.
    pub payload: String,
    /// Signing decision.
    pub signing: Signing,
}

// ============================================================================
// MessageCodec
// ============================================================================

/// Encoder/decoder for the daemon's wire protocol.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    manifest_method: String,
    bootstrap_callback: CallbackName,
    preemptive: FxHashSet<String>,
}

impl MessageCodec {
    /// Creates a codec.
    ///
    /// Requests for `manifest_method` and for any `preemptive` operation are
    /// sent unsigned.
    #[must_use]
    pub fn new(
        manifest_method: impl Into<String>,
        bootstrap_callback: CallbackName,
        preemptive: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            manifest_method: manifest_method.into(),
            bootstrap_callback,
            preemptive: preemptive.into_iter().map(Into::into).collect(),
        }
    }

    /// Name of the manifest method.
    #[inline]
    #[must_use]
    pub fn manifest_method(&self) -> &str {
        &self.manifest_method
    }

    /// Returns `true` if requests for `method` must be signed.
    #[inline]
    #[must_use]
    pub fn requires_signature(&self, method: &str) -> bool {
        method != self.manifest_method && !self.preemptive.contains(method)
    }

    /// Serialises a request.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if a parameter cannot be serialised.
    pub fn encode(&self, request: &OutboundRequest) -> Result<Encoded> {
        let payload = serde_json::to_string(request)?;
        let signing = if request.init || !self.requires_signature(&request.method) {
            Signing::Unsigned
        } else {
            Signing::Required
        };

        Ok(Encoded { payload, signing })
    }

    /// Parses and normalises an inbound frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Remote`] if the message carries an `error`
    /// - [`Error::Json`] if the frame or a nested JSON result is malformed
    /// - [`Error::Protocol`] if the manifest has no method list
    ///
    /// Manifest entries that do not describe a method are skipped.
    pub fn decode(&self, text: &str) -> Result<Inbound> {
        let message: InboundMessage = serde_json::from_str(text)?;

        if let Some(error) = message.error {
            let message = match error {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Err(Error::remote(message));
        }

        if message.method.as_deref() == Some(self.manifest_method.as_str()) {
            let result = message
                .result
                .ok_or_else(|| Error::protocol("manifest without a method list"))?;
            let Value::Array(entries) = result else {
                return Err(Error::protocol("manifest result is not a method list"));
            };
            return Ok(Inbound::Manifest(descriptors(entries)));
        }

        let bootstrap = message.callback.as_ref() == Some(&self.bootstrap_callback);
        let result = message.result.map(coerce).transpose()?;

        let mut payload = match result {
            None => Payload::Empty,
            Some(value) if bootstrap => Payload::Value(value),
            Some(Value::Null) => Payload::Empty,
            Some(Value::Array(items)) => Payload::Args(items),
            Some(value) => Payload::Args(vec![value]),
        };

        if message.method.as_deref() == Some(EXCEPTION_METHOD) && !payload.is_empty() {
            payload = Payload::Exception(exception_from(payload));
        }

        Ok(Inbound::Response(Response {
            method: message.method,
            callback: message.callback,
            init: message.init,
            bootstrap,
            payload,
        }))
    }
}

// ============================================================================
// Normalisation
// ============================================================================

/// Applies the string coercions to a raw result.
fn coerce(value: Value) -> Result<Value> {
    let Value::String(raw) = value else {
        return Ok(value);
    };

    let text = raw.replace("%5C", "\\").replace("%22", "\"");

    if text == "true" || text == "false" {
        return Ok(Value::Bool(text == "true"));
    }

    if text.starts_with('[') {
        return Ok(serde_json::from_str(&text)?);
    }

    if text == "null" {
        return Ok(Value::Null);
    }

    Ok(Value::String(text))
}

/// Builds the exception object from a non-empty payload.
fn exception_from(payload: Payload) -> RemoteException {
    let message = match payload.into_value() {
        Value::Array(mut items) if items.len() == 1 => match items.remove(0) {
            Value::String(s) => s,
            other => other.to_string(),
        },
        Value::String(s) => s,
        other => other.to_string(),
    };
    RemoteException::new(message)
}

/// Parses manifest entries, dropping the ones that are not method
/// descriptors.
fn descriptors(entries: Vec<Value>) -> Vec<MethodDescriptor> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!(%entry, error = %e, "Skipping malformed manifest entry");
                None
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
