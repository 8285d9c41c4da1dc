//! Remote surface built from the daemon's manifest.
//!
//! # Lifecycle
//!
//! | Event | Effect |
//! |-------|--------|
//! | session opened | surface reset to empty |
//! | manifest received | callables registered, preemptive calls sent |
//! | bootstrap result | operation replaced by a cached constant |
//! | all preemptive results | bridge is ready |
//! | session ended | surface torn down |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bootstrap` | Readiness gate over the preemptive operations |
//! | `registry` | Arity dispatch table |
//! | `surface` | Callbacks, constants and the [`Remote`] handle |

// ============================================================================
// Submodules
// ============================================================================

/// Readiness gate.
pub mod bootstrap;

/// Arity dispatch table.
pub mod registry;

/// Callables, callbacks and constants.
pub mod surface;

// ============================================================================
// Re-exports
// ============================================================================

pub use bootstrap::BootstrapGate;
pub use registry::{CallableEntry, MethodRegistry};
pub use surface::{
    Argument, CallOutcome, CallPolicy, Callback, Continuation, Namespace, Prepared, Remote,
};
