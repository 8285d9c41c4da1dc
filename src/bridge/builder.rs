//! Builder pattern for bridge configuration.
//!
//! Provides a fluent API for configuring and connecting a [`Bridge`].
//!
//! # Example
//!
//! ```no_run
//! use qz_bridge::Bridge;
//!
//! # async fn example() -> qz_bridge::Result<()> {
//! let bridge = Bridge::builder()
//!     .host("printserver.local")
//!     .certificate("-----BEGIN CERTIFICATE-----...")
//!     .on_event(|event| println!("{event:?}"))
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::transport::{Connector, TungsteniteConnector};

use super::collaborators::{
    CertificateSupplier, Collaborators, FallbackLauncher, LogFallback, Signer, StaticCertificate,
    UnsignedSigner,
};
use super::core::{Bridge, BridgeEvent, EventHandler};
use super::options::BridgeOptions;

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`].
///
/// Use [`Bridge::builder()`] to create a new builder.
#[derive(Default)]
pub struct BridgeBuilder {
    options: BridgeOptions,
    signer: Option<Arc<dyn Signer>>,
    certificate: Option<Arc<dyn CertificateSupplier>>,
    fallback: Option<Arc<dyn FallbackLauncher>>,
    connector: Option<Arc<dyn Connector>>,
    handler: Option<EventHandler>,
}

impl fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("options", &self.options)
            .field("has_signer", &self.signer.is_some())
            .field("has_certificate", &self.certificate.is_some())
            .field("has_fallback", &self.fallback.is_some())
            .field("has_connector", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BridgeBuilder Implementation
// ============================================================================

impl BridgeBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the daemon host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options = self.options.with_host(host);
        self
    }

    /// Marks the embedding page as secure, restricting candidates to `wss`.
    #[inline]
    #[must_use]
    pub fn secure_page(mut self, secure: bool) -> Self {
        self.options = self.options.with_secure_page(secure);
        self
    }

    /// Sets the request signer. Defaults to [`UnsignedSigner`].
    #[inline]
    #[must_use]
    pub fn signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Sets the certificate supplier.
    #[inline]
    #[must_use]
    pub fn certificate_supplier(mut self, supplier: impl CertificateSupplier + 'static) -> Self {
        self.certificate = Some(Arc::new(supplier));
        self
    }

    /// Uses a fixed PEM certificate.
    #[inline]
    #[must_use]
    pub fn certificate(self, pem: impl Into<String>) -> Self {
        self.certificate_supplier(StaticCertificate::new(pem))
    }

    /// Sets the launcher called when no candidate answers. Defaults to
    /// [`LogFallback`].
    #[inline]
    #[must_use]
    pub fn fallback(mut self, fallback: impl FallbackLauncher + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Sets the socket connector. Defaults to [`TungsteniteConnector`].
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the handler receiving [`BridgeEvent`]s.
    ///
    /// The handler runs on the event loop; a panic in it is caught and
    /// logged.
    #[inline]
    #[must_use]
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(BridgeEvent) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Validates the configuration and starts connecting.
    ///
    /// Must be called from within a Tokio runtime. Returns as soon as the
    /// event loop is running; use [`Bridge::wait_ready`] to wait for the
    /// surface.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the options are invalid or no certificate
    /// supplier is set.
    pub fn connect(self) -> Result<Bridge> {
        self.options.validate()?;

        let certificate = self.certificate.ok_or_else(|| {
            Error::config(
                "A certificate supplier is required. Use .certificate() or \
                 .certificate_supplier() to set it.",
            )
        })?;

        let collaborators = Collaborators {
            signer: self.signer.unwrap_or_else(|| Arc::new(UnsignedSigner)),
            certificate,
            fallback: self.fallback.unwrap_or_else(|| Arc::new(LogFallback)),
        };
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(TungsteniteConnector));

        Ok(Bridge::spawn(
            &self.options,
            collaborators,
            connector,
            self.handler,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_is_required() {
        let err = BridgeBuilder::new().connect().unwrap_err();
        assert!(matches!(err, Error::Config { ref message } if message.contains("certificate")));
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let err = BridgeBuilder::new()
            .host("")
            .certificate("CERT")
            .connect()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_builder_sets_options() {
        let builder = BridgeBuilder::new().host("10.0.0.5").secure_page(true);
        assert_eq!(builder.options.host, "10.0.0.5");
        assert!(builder.options.secure_page);
        assert!(format!("{builder:?}").contains("has_certificate: false"));
    }
}
