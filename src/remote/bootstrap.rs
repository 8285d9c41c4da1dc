//! Bootstrap gate.
//!
//! Holds the names of the preemptive operations whose results must be
//! cached before the remote surface is usable. Each completion removes one
//! name; readiness fires once, when the set first becomes empty.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;

use tracing::debug;

// ============================================================================
// BootstrapGate
// ============================================================================

/// Pending preemptive operations of one session.
#[derive(Debug, Clone)]
pub struct BootstrapGate {
    pending: BTreeSet<String>,
    signaled: bool,
}

impl BootstrapGate {
    /// Creates a gate waiting on `names`.
    #[must_use]
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            pending: names.into_iter().map(Into::into).collect(),
            signaled: false,
        }
    }

    /// Called once the manifest is installed.
    ///
    /// Returns `true` if nothing is pending, in which case readiness is
    /// signalled immediately.
    pub fn arm(&mut self) -> bool {
        if self.pending.is_empty() && !self.signaled {
            self.signaled = true;
            return true;
        }
        false
    }

    /// Records the completion of `name`.
    ///
    /// Returns `true` exactly once: on the completion that empties the set.
    /// Completions for names that are not pending do nothing.
    pub fn complete(&mut self, name: &str) -> bool {
        if !self.pending.remove(name) {
            return false;
        }

        debug!(name, remaining = self.pending.len(), "Preemptive method ready");

        if self.pending.is_empty() && !self.signaled {
            self.signaled = true;
            return true;
        }
        false
    }

    /// Returns `true` once readiness has been signalled.
    #[inline]
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.signaled
    }

    /// Names still pending.
    #[must_use]
    pub fn pending(&self) -> Vec<&str> {
        self.pending.iter().map(String::as_str).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
