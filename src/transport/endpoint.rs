//! Endpoint candidates and the selector cursor.
//!
//! The daemon listens on a pair of ports per slot: the secure WebSocket on
//! the base port and the plain one on `base + 1`. The scheme is picked once
//! from whether the hosting page is secure; only the port dimension is
//! retried.
//!
//! ```text
//!            8181    8282    8383    8484
//!   wss://    [0]  →  [1]  →  [2]  →  [3]   (secure page)
//!   ws://    8182    8283    8384    8485   (insecure page)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Scheme
// ============================================================================

/// WebSocket scheme of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// `wss://`, served on the base port.
    Secure,
    /// `ws://`, served on the base port plus one.
    Insecure,
}

impl Scheme {
    /// Scheme order; secure is tried before insecure.
    pub const ALL: [Scheme; 2] = [Scheme::Secure, Scheme::Insecure];

    /// URL prefix for this scheme.
    #[inline]
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Secure => "wss",
            Self::Insecure => "ws",
        }
    }

    /// Offset added to the candidate's base port.
    #[inline]
    #[must_use]
    pub const fn port_offset(self) -> u16 {
        match self {
            Self::Secure => 0,
            Self::Insecure => 1,
        }
    }

    /// Scheme to use for a page loaded securely or not.
    #[inline]
    #[must_use]
    pub const fn for_page(secure_page: bool) -> Self {
        if secure_page {
            Self::Secure
        } else {
            Self::Insecure
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

// ============================================================================
// EndpointCandidate
// ============================================================================

/// One (scheme, port) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointCandidate {
    /// WebSocket scheme.
    pub scheme: Scheme,
    /// Base port of the slot; the effective port adds the scheme offset.
    pub base_port: u16,
}

impl EndpointCandidate {
    /// Port actually dialled for this candidate.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.base_port.saturating_add(self.scheme.port_offset())
    }
}

// ============================================================================
// EndpointSelector
// ============================================================================

/// Scan position over the candidate matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorCursor {
    /// Index into [`Scheme::ALL`]; fixed for the selector's lifetime.
    pub scheme_index: usize,
    /// Index into the port list; only ever advances.
    pub port_index: usize,
}

/// Enumerates endpoint candidates in order.
///
/// The cursor moves forward through the port list and never wraps. Once
/// [`advance`](Self::advance) has returned `false` the selector is exhausted
/// and stays that way.
#[derive(Debug, Clone)]
pub struct EndpointSelector {
    host: String,
    ports: Vec<u16>,
    cursor: SelectorCursor,
    exhausted: bool,
}

impl EndpointSelector {
    /// Creates a selector over `ports` on `host`.
    ///
    /// `ports` must not be empty; [`BridgeOptions::validate`](crate::BridgeOptions::validate)
    /// rejects that configuration before a selector is built.
    #[must_use]
    pub fn new(host: impl Into<String>, ports: Vec<u16>, secure_page: bool) -> Self {
        let scheme = Scheme::for_page(secure_page);
        let scheme_index = Scheme::ALL
            .iter()
            .position(|s| *s == scheme)
            .unwrap_or_default();

        Self {
            host: host.into(),
            ports,
            cursor: SelectorCursor {
                scheme_index,
                port_index: 0,
            },
            exhausted: false,
        }
    }

    /// Returns the candidate under the cursor.
    #[must_use]
    pub fn current(&self) -> EndpointCandidate {
        EndpointCandidate {
            scheme: Scheme::ALL[self.cursor.scheme_index],
            base_port: self.ports.get(self.cursor.port_index).copied().unwrap_or_default(),
        }
    }

    /// Moves to the next port.
    ///
    /// Returns `false`, leaving the cursor where it is, when no candidate
    /// remains.
    pub fn advance(&mut self) -> bool {
        if self.cursor.port_index + 1 < self.ports.len() {
            self.cursor.port_index += 1;
            true
        } else {
            self.exhausted = true;
            false
        }
    }

    /// Returns `true` once [`advance`](Self::advance) has failed.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Current cursor position.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> SelectorCursor {
        self.cursor
    }

    /// Number of candidates handed out so far.
    #[inline]
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.cursor.port_index + 1
    }

    /// Number of candidates in the list.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Returns `true` if there are no candidates at all.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Starts a new scan from the first port.
    ///
    /// Used for an explicit redeploy only; a running scan never wraps.
    pub fn reset(&mut self) {
        self.cursor.port_index = 0;
        self.exhausted = false;
    }

    /// Composes `scheme://host:port` for a candidate.
    #[must_use]
    pub fn build_url(&self, candidate: EndpointCandidate) -> String {
        format!("{}://{}:{}", candidate.scheme, self.host, candidate.port())
    }

    /// URL of the candidate under the cursor.
    #[inline]
    #[must_use]
    pub fn current_url(&self) -> String {
        self.build_url(self.current())
    }
}

// ============================================================================
// Tests
// ============================================================================
