//! Bridge entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Event loop handle and status |
//! | [`BridgeBuilder`] | Fluent configuration builder |
//! | [`BridgeOptions`] | Host, ports, keep-alive and callback names |
//! | [`Signer`] | Request signing seam |
//! | [`CertificateSupplier`] | Site certificate seam |
//! | [`FallbackLauncher`] | Called when no daemon answers |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder.
pub mod builder;

/// Host-supplied collaborators.
pub mod collaborators;

/// Event loop and bridge handle.
pub mod core;

/// Bridge options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeBuilder;
pub use collaborators::{
    CertificateSupplier, FallbackLauncher, LogFallback, Signer, StaticCertificate, UnsignedSigner,
};
pub use core::{Bridge, BridgeEvent, ConnectionStatus, EventHandler};
pub use options::BridgeOptions;
