//! Bridge configuration.
//!
//! The defaults match a stock daemon install: `localhost` on the four
//! secure base ports, a one-minute keep-alive, and the daemon's standard
//! callback names.
//!
//! # Example
//!
//! ```
//! use qz_bridge::BridgeOptions;
//! use std::time::Duration;
//!
//! let options = BridgeOptions::new()
//!     .with_host("printserver.local")
//!     .with_secure_page(true)
//!     .with_keep_alive_interval(Duration::from_secs(30));
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::identifiers::CallbackName;
use crate::protocol::MessageCodec;
use crate::remote::CallPolicy;
use crate::transport::{EndpointSelector, KeepAlive};

// ============================================================================
// Constants
// ============================================================================

/// Default daemon host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default secure base ports; each insecure port is base + 1.
pub const DEFAULT_PORTS: [u16; 4] = [8181, 8282, 8383, 8484];

/// Default keep-alive interval.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Default keep-alive sentinel.
pub const DEFAULT_KEEP_ALIVE_PAYLOAD: &str = "ping";

/// Default bootstrap callback name.
pub const DEFAULT_BOOTSTRAP_CALLBACK: &str = "setupMethods";

/// Default manifest method.
pub const DEFAULT_MANIFEST_METHOD: &str = "listMessages";

/// Operations whose results are cached before the bridge is ready.
pub const DEFAULT_PREEMPTIVE: [&str; 4] =
    ["isActive", "getVersion", "getPrinter", "getLogPostScriptFeatures"];

/// Callback used per operation when the caller supplies no continuation.
const DEFAULT_CALLBACK_MAP: &[(&str, &str)] = &[
    ("findPrinter", "qzDoneFinding"),
    ("findPrinters", "qzDoneFinding"),
    ("appendFile", "qzDoneAppending"),
    ("appendXML", "qzDoneAppending"),
    ("appendPDF", "qzDoneAppending"),
    ("appendImage", "qzDoneAppending"),
    ("print", "qzDonePrinting"),
    ("printPS", "qzDonePrinting"),
    ("printHTML", "qzDonePrinting"),
    ("printToHost", "qzDonePrinting"),
    ("printToFile", "qzDonePrinting"),
    ("findPorts", "qzDoneFindingPorts"),
    ("openPort", "qzDoneOpeningPort"),
    ("closePort", "qzDoneClosingPort"),
    ("findNetworkInfo", "qzDoneFindingNetwork"),
];

// ============================================================================
// BridgeOptions
// ============================================================================

/// Bridge configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Daemon host.
    pub host: String,

    /// Secure base ports, tried in order.
    pub ports: Vec<u16>,

    /// The embedding page is served over a secure scheme; skips `ws`.
    pub secure_page: bool,

    /// Interval between keep-alive frames.
    pub keep_alive_interval: Duration,

    /// Keep-alive frame text.
    pub keep_alive_payload: String,

    /// Callback names for calls made without a continuation.
    pub callback_map: FxHashMap<String, CallbackName>,

    /// Operations cached before readiness.
    pub preemptive: Vec<String>,

    /// Callback name reserved for bootstrap calls.
    pub bootstrap_callback: CallbackName,

    /// Method returning the manifest.
    pub manifest_method: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with the stock defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            ports: DEFAULT_PORTS.to_vec(),
            secure_page: false,
            keep_alive_interval: DEFAULT_KEEP_ALIVE,
            keep_alive_payload: DEFAULT_KEEP_ALIVE_PAYLOAD.to_string(),
            callback_map: DEFAULT_CALLBACK_MAP
                .iter()
                .map(|(method, callback)| ((*method).to_string(), CallbackName::new(*callback)))
                .collect(),
            preemptive: DEFAULT_PREEMPTIVE.iter().map(|s| (*s).to_string()).collect(),
            bootstrap_callback: CallbackName::new(DEFAULT_BOOTSTRAP_CALLBACK),
            manifest_method: DEFAULT_MANIFEST_METHOD.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Sets the daemon host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replaces the base port list.
    #[inline]
    #[must_use]
    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    /// Marks the embedding page as secure.
    #[inline]
    #[must_use]
    pub fn with_secure_page(mut self, secure: bool) -> Self {
        self.secure_page = secure;
        self
    }

    /// Sets the keep-alive interval.
    #[inline]
    #[must_use]
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Sets the keep-alive frame text.
    #[inline]
    #[must_use]
    pub fn with_keep_alive_payload(mut self, payload: impl Into<String>) -> Self {
        self.keep_alive_payload = payload.into();
        self
    }

    /// Maps `method` to `callback` for calls without a continuation.
    #[inline]
    #[must_use]
    pub fn with_callback(mut self, method: impl Into<String>, callback: impl Into<CallbackName>) -> Self {
        self.callback_map.insert(method.into(), callback.into());
        self
    }

    /// Replaces the preemptive operations.
    #[inline]
    #[must_use]
    pub fn with_preemptive(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.preemptive = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the bootstrap callback name.
    #[inline]
    #[must_use]
    pub fn with_bootstrap_callback(mut self, name: impl Into<CallbackName>) -> Self {
        self.bootstrap_callback = name.into();
        self
    }

    /// Sets the manifest method name.
    #[inline]
    #[must_use]
    pub fn with_manifest_method(mut self, method: impl Into<String>) -> Self {
        self.manifest_method = method.into();
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl BridgeOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("Host must not be empty"));
        }

        if self.ports.is_empty() {
            return Err(Error::config("At least one port is required"));
        }

        if let Some(port) = self.ports.iter().find(|&&p| p == 0 || p == u16::MAX) {
            return Err(Error::config(format!(
                "Port {port} is out of range; base ports must be 1..=65534"
            )));
        }

        if self.keep_alive_interval.is_zero() {
            return Err(Error::config("Keep-alive interval must be greater than zero"));
        }

        if self.manifest_method.is_empty() {
            return Err(Error::config("Manifest method must not be empty"));
        }

        if let Some((method, _)) = self
            .callback_map
            .iter()
            .find(|(_, callback)| **callback == self.bootstrap_callback)
        {
            return Err(Error::config(format!(
                "Operation {method} is mapped to the bootstrap callback {}",
                self.bootstrap_callback
            )));
        }

        Ok(())
    }

    /// Fresh endpoint selector for these options.
    #[must_use]
    pub fn selector(&self) -> EndpointSelector {
        EndpointSelector::new(self.host.clone(), self.ports.clone(), self.secure_page)
    }

    /// Keep-alive settings.
    #[must_use]
    pub fn keep_alive(&self) -> KeepAlive {
        KeepAlive {
            interval: self.keep_alive_interval,
            payload: self.keep_alive_payload.clone(),
        }
    }

    /// Codec configured with the manifest method and signing exemptions.
    #[must_use]
    pub fn codec(&self) -> MessageCodec {
        MessageCodec::new(
            self.manifest_method.clone(),
            self.bootstrap_callback.clone(),
            self.preemptive.iter().cloned(),
        )
    }

    /// Callback resolution rules.
    #[must_use]
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            callback_map: self.callback_map.clone(),
            bootstrap: self.bootstrap_callback.clone(),
            preemptive: self.preemptive.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::new();
        assert_eq!(options.host, "localhost");
        assert_eq!(options.ports, vec![8181, 8282, 8383, 8484]);
        assert_eq!(options.keep_alive_interval, Duration::from_secs(60));
        assert_eq!(options.bootstrap_callback, CallbackName::new("setupMethods"));
        assert_eq!(
            options.callback_map.get("findPrinter"),
            Some(&CallbackName::new("qzDoneFinding"))
        );
        assert_eq!(
            options.callback_map.get("printToFile"),
            Some(&CallbackName::new("qzDonePrinting"))
        );
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let options = BridgeOptions::new()
            .with_host("10.0.0.5")
            .with_ports([9000])
            .with_secure_page(true)
            .with_preemptive(["getVersion"])
            .with_callback("getPrinterName", "gotName");

        assert_eq!(options.selector().current_url(), "wss://10.0.0.5:9000");
        assert_eq!(options.selector().len(), 1);
        assert_eq!(options.call_policy().preemptive, vec!["getVersion".to_string()]);
        assert_eq!(
            options.callback_map.get("getPrinterName"),
            Some(&CallbackName::new("gotName"))
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(BridgeOptions::new().with_host(" ").validate().is_err());
        assert!(BridgeOptions::new().with_ports([]).validate().is_err());
        assert!(BridgeOptions::new().with_ports([8181, 0]).validate().is_err());
        assert!(BridgeOptions::new().with_ports([u16::MAX]).validate().is_err());
        assert!(
            BridgeOptions::new()
                .with_keep_alive_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_bootstrap_in_callback_map() {
        let err = BridgeOptions::new()
            .with_callback("print", "setupMethods")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_codec_exempts_preemptive() {
        let codec = BridgeOptions::new().codec();
        assert!(!codec.requires_signature("getVersion"));
        assert!(!codec.requires_signature("listMessages"));
        assert!(codec.requires_signature("print"));
    }
}
