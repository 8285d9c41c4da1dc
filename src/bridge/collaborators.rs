//! Host-supplied collaborators.
//!
//! | Trait | Called when | Default |
//! |-------|-------------|---------|
//! | [`Signer`] | before each signed request | [`UnsignedSigner`] |
//! | [`CertificateSupplier`] | once per opened session | required |
//! | [`FallbackLauncher`] | every candidate failed | [`LogFallback`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;

// ============================================================================
// Traits
// ============================================================================

/// Produces the signature prepended to a signed request.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs the JSON text of a request.
    ///
    /// # Errors
    ///
    /// The request is dropped and the failure reported.
    async fn sign(&self, payload: &str) -> Result<String>;
}

/// Supplies the site certificate sent with the manifest request.
#[async_trait]
pub trait CertificateSupplier: Send + Sync {
    /// Returns the PEM certificate text.
    ///
    /// # Errors
    ///
    /// The certificate is sent as an empty string and the failure reported.
    async fn certificate(&self) -> Result<String>;
}

/// Launches the daemon, or tells the user to, when no candidate answers.
pub trait FallbackLauncher: Send + Sync {
    /// Called once per exhausted scan.
    fn launch(&self);
}

// ============================================================================
// Defaults
// ============================================================================

/// Sends every request with an empty signature.
///
/// The daemon then asks the user to approve each request.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedSigner;

#[async_trait]
impl Signer for UnsignedSigner {
    async fn sign(&self, _payload: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Certificate known up front.
#[derive(Debug, Clone, Default)]
pub struct StaticCertificate(String);

impl StaticCertificate {
    /// Wraps PEM text.
    #[inline]
    #[must_use]
    pub fn new(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }
}

#[async_trait]
impl CertificateSupplier for StaticCertificate {
    async fn certificate(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Logs a warning that the daemon is not running.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFallback;

impl FallbackLauncher for LogFallback {
    fn launch(&self) {
        warn!("Print daemon is not running or not reachable; start it and reconnect");
    }
}

impl<F> FallbackLauncher for F
where
    F: Fn() + Send + Sync,
{
    fn launch(&self) {
        self()
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// The collaborator set handed to the event loop.
#[derive(Clone)]
pub(crate) struct Collaborators {
    pub(crate) signer: Arc<dyn Signer>,
    pub(crate) certificate: Arc<dyn CertificateSupplier>,
    pub(crate) fallback: Arc<dyn FallbackLauncher>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
