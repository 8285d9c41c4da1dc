//! Wire protocol message types.
//!
//! This module defines the message format spoken with the print daemon.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `OutboundRequest` | Bridge → Daemon | Call an operation |
//! | `InboundMessage` | Daemon → Bridge | Result, manifest or error |
//! | keep-alive | Bridge → Daemon | Sentinel text, no response |
//!
//! # Session Bootstrap
//!
//! 1. Bridge sends `{"method":"listMessages","params":[certificate]}` unsigned
//! 2. Daemon answers with the manifest of `{name, parameters, returns}`
//! 3. Bridge calls each preemptive operation with callback `setupMethods`
//! 4. Daemon answers each; results become cached constants
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Encoding, signing decision, decoding and normalisation |
//! | `message` | Inbound message, manifest and payload types |
//! | `request` | Outbound request type |

// ============================================================================
// Submodules
// ============================================================================

/// Encoding and decoding.
pub mod codec;

/// Inbound message types.
pub mod message;

/// Outbound request type.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{Encoded, MessageCodec, Signing};
pub use message::{Inbound, InboundMessage, MethodDescriptor, Payload, RemoteException, Response};
pub use request::OutboundRequest;
