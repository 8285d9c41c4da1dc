//! QZ bridge - client for a local print daemon over WebSocket.
//!
//! This library finds a running print daemon, keeps the connection alive,
//! and exposes the daemon's operations as a dynamically built remote
//! surface.
//!
//! # Architecture
//!
//! The bridge follows a client-server model:
//!
//! - **Local End (Rust)**: Dials the daemon, sends calls, dispatches results
//! - **Remote End (daemon)**: Publishes a manifest of operations, answers calls
//!
//! Key design principles:
//!
//! - One event loop task owns the connection; sessions report events to it
//! - Candidates are tried in order and never wrapped around
//! - The remote surface is rebuilt from the manifest on every session
//! - Results are delivered to continuations correlated by callback name
//!
//! # Quick Start
//!
//! ```no_run
//! use qz_bridge::{Argument, Bridge, Continuation, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let bridge = Bridge::builder()
//!         .certificate("-----BEGIN CERTIFICATE-----...")
//!         .connect()?;
//!
//!     bridge.wait_ready().await?;
//!
//!     let remote = bridge.remote();
//!     println!("Daemon version: {:?}", remote.cached("getVersion"));
//!
//!     remote.call(
//!         "findPrinter",
//!         vec![
//!             Argument::value("zebra"),
//!             Continuation::unnamed(|payload| {
//!                 println!("Found: {:?}", payload.first());
//!                 Ok(())
//!             })
//!             .into(),
//!         ],
//!     )?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Entry point: [`Bridge`], [`BridgeBuilder`], [`BridgeOptions`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire messages and codec |
//! | [`remote`] | Manifest-driven remote surface |
//! | [`transport`] | Endpoint fallback, sessions and keep-alive |
//!
//! # Features
//!
//! - **`native-tls`**: enables `wss://` candidates

// ============================================================================
// Modules
// ============================================================================

/// Bridge entry point and configuration.
///
/// Use [`Bridge::builder()`] to create a configured bridge.
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire protocol message types and codec.
pub mod protocol;

/// Remote surface built from the manifest.
pub mod remote;

/// WebSocket transport layer.
///
/// Endpoint fallback, sessions and the retry state machine.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{
    Bridge, BridgeBuilder, BridgeEvent, BridgeOptions, CertificateSupplier, ConnectionStatus,
    EventHandler, FallbackLauncher, LogFallback, Signer, StaticCertificate, UnsignedSigner,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CallbackName, SessionId};

// Protocol types
pub use protocol::{Payload, RemoteException};

// Remote surface types
pub use remote::{Argument, CallOutcome, Callback, Continuation, Remote};
