//! Type-safe identifiers.
//!
//! Newtype wrappers keep session ids and callback correlation tokens from
//! being mixed up with arbitrary strings.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// SessionId
// ============================================================================

/// Identifies one transport session (one socket attempt).
///
/// Events carry the id of the session that produced them so events from a
/// session that has already been cleaned up can be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CallbackName
// ============================================================================

/// Correlation token naming a continuation.
///
/// The daemon echoes this name in the `callback` field of its response; the
/// bridge uses it to find the continuation to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackName(String);

impl CallbackName {
    /// Creates a callback name.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Default name for a continuation passed to `method` without a name.
    #[inline]
    #[must_use]
    pub fn for_method(method: &str) -> Self {
        Self(format!("{method}_callback"))
    }

    /// Returns the name as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallbackName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CallbackName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for CallbackName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

// ============================================================================
// Tests
// ============================================================================
