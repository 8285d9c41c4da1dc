//! The remote surface: callables, callbacks and cached constants.
//!
//! A [`Namespace`] is the per-session table the bridge dispatches through.
//! It is created empty when a session opens, filled from the manifest, and
//! torn down when the session ends. Page-level callbacks registered with
//! [`Namespace::register_global`] survive across sessions.
//!
//! [`Remote`] is the cloneable handle applications use to call operations.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::CallbackName;
use crate::protocol::{MethodDescriptor, OutboundRequest, Payload};

use super::registry::MethodRegistry;

// ============================================================================
// Types
// ============================================================================

/// Continuation invoked with a response payload.
///
/// Returning an error (or panicking) is reported and isolated to the
/// message being dispatched.
pub type Callback = Arc<dyn Fn(&Payload) -> Result<()> + Send + Sync>;

// ============================================================================
// Continuation
// ============================================================================

/// A callback together with its correlation token.
#[derive(Clone)]
pub struct Continuation {
    name: Option<CallbackName>,
    callback: Callback,
}

impl Continuation {
    /// A continuation correlated by `name`.
    #[must_use]
    pub fn named<F>(name: impl Into<CallbackName>, callback: F) -> Self
    where
        F: Fn(&Payload) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            callback: Arc::new(callback),
        }
    }

    /// A continuation correlated by `<method>_callback`.
    #[must_use]
    pub fn unnamed<F>(callback: F) -> Self
    where
        F: Fn(&Payload) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: None,
            callback: Arc::new(callback),
        }
    }

    /// The bootstrap continuation; handled by the bridge itself.
    #[must_use]
    pub(crate) fn bootstrap(name: CallbackName) -> Self {
        Self {
            name: Some(name),
            callback: Arc::new(|_: &Payload| -> Result<()> { Ok(()) }),
        }
    }

    /// Explicit correlation token, if any.
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&CallbackName> {
        self.name.as_ref()
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Argument
// ============================================================================

/// One argument of a remote call.
#[derive(Debug, Clone)]
pub enum Argument {
    /// Positional parameter.
    Value(Value),
    /// Continuation; only meaningful as the last argument.
    Continuation(Continuation),
}

impl Argument {
    /// Positional parameter from anything convertible to JSON.
    #[inline]
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Wire value of the argument; continuations serialise as `null`.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::Continuation(_) => Value::Null,
        }
    }
}

impl From<Continuation> for Argument {
    fn from(continuation: Continuation) -> Self {
        Self::Continuation(continuation)
    }
}

// ============================================================================
// CallPolicy
// ============================================================================

/// Static rules for resolving callback names.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Callback used when a call has no continuation, by operation.
    pub callback_map: FxHashMap<String, CallbackName>,
    /// Callback name reserved for bootstrap calls.
    pub bootstrap: CallbackName,
    /// Operations called with the bootstrap callback after the manifest.
    pub preemptive: Vec<String>,
}

// ============================================================================
// CallOutcome
// ============================================================================

/// Result of calling an operation on the surface.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The request was queued; the result arrives through a callback.
    Sent,
    /// The operation is a cached constant.
    Cached(Value),
}

// ============================================================================
// Namespace
// ============================================================================

/// Per-session callable table.
pub struct Namespace {
    registry: MethodRegistry,
    callbacks: FxHashMap<CallbackName, Callback>,
    constants: FxHashMap<String, Value>,
    globals: FxHashMap<CallbackName, Callback>,
    policy: CallPolicy,
}

impl Namespace {
    /// Creates an empty namespace.
    #[must_use]
    pub fn new(policy: CallPolicy) -> Self {
        Self {
            registry: MethodRegistry::new(),
            callbacks: FxHashMap::default(),
            constants: FxHashMap::default(),
            globals: FxHashMap::default(),
            policy,
        }
    }

    /// Drops everything tied to the session; globals are kept.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.callbacks.clear();
        self.constants.clear();
        trace!("Remote surface reset");
    }

    /// Installs the manifest and returns the preemptive bootstrap calls.
    ///
    /// Preemptive operations without a zero-argument overload in the
    /// manifest are skipped.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if a manifest was already installed.
    pub fn install(&mut self, manifest: Vec<MethodDescriptor>) -> Result<Vec<OutboundRequest>> {
        let count = self.registry.install(manifest)?;
        debug!(count, "Added methods to remote surface");

        let bootstrap = self.policy.bootstrap.clone();
        let preemptive: Vec<String> = self
            .policy
            .preemptive
            .iter()
            .filter(|name| {
                let known = self.registry.resolve(name, &[]).is_ok();
                if !known {
                    debug!(method = %name, "Preemptive method not offered by daemon, skipping");
                }
                known
            })
            .cloned()
            .collect();

        preemptive
            .into_iter()
            .map(|name| {
                let continuation = Continuation::bootstrap(bootstrap.clone());
                self.prepare(&name, vec![Argument::Continuation(continuation)])
            })
            .filter_map(|outcome| match outcome {
                Ok(Prepared::Send(request)) => Some(Ok(request)),
                Ok(Prepared::Cached(_)) => None,
                Err(e) => Some(Err(e)),
            })
            .collect()
    }

    /// Resolves a call into a request, or a cached constant.
    ///
    /// Registers the call's continuation under its resolved name unless that
    /// name is the bootstrap callback.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMethod`] if no callable matches.
    pub fn prepare(&mut self, name: &str, args: Vec<Argument>) -> Result<Prepared> {
        if let Some(value) = self.constants.get(name) {
            return Ok(Prepared::Cached(value.clone()));
        }

        let entry = self.registry.resolve(name, &args)?.clone();
        let (params, continuation) = entry.bind(args);

        let callback = match continuation {
            Some(Continuation { name, callback }) => {
                let resolved = name.unwrap_or_else(|| CallbackName::for_method(&entry.name));
                if resolved != self.policy.bootstrap {
                    self.callbacks.insert(resolved.clone(), callback);
                }
                Some(resolved)
            }
            None => {
                let mapped = self.policy.callback_map.get(&entry.name).cloned();
                debug!(method = %entry.name, callback = ?mapped, "Using mapped callback");
                mapped
            }
        };

        let init = callback.as_ref() == Some(&self.policy.bootstrap);
        debug!(
            method = %entry.name,
            arity = entry.arity,
            callback = ?callback,
            "Calling remote method"
        );

        Ok(Prepared::Send(OutboundRequest::new(
            entry.name, params, callback, init,
        )))
    }

    /// Replaces `method` with a constant returning `value`.
    pub fn cache(&mut self, method: &str, value: Value) {
        debug!(method, %value, "Resetting function call to cached result");
        self.constants.insert(method.to_string(), value);
    }

    /// Cached constant for `method`.
    #[must_use]
    pub fn constant(&self, method: &str) -> Option<&Value> {
        self.constants.get(method)
    }

    /// Finds a callback, first on the surface, then among the globals.
    #[must_use]
    pub fn lookup_callback(&self, name: &CallbackName) -> Option<Callback> {
        self.callbacks
            .get(name)
            .or_else(|| self.globals.get(name))
            .cloned()
    }

    /// Registers a page-level callback.
    pub fn register_global(&mut self, name: CallbackName, callback: Callback) {
        self.globals.insert(name, callback);
    }

    /// Removes a page-level callback.
    pub fn remove_global(&mut self, name: &CallbackName) -> bool {
        self.globals.remove(name).is_some()
    }

    /// The method registry.
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &MethodRegistry {
        &self.registry
    }
}

/// A prepared call.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Send this request.
    Send(OutboundRequest),
    /// Return this constant.
    Cached(Value),
}

// ============================================================================
// Callback Invocation
// ============================================================================

/// Runs a callback, turning errors and panics into [`Error::CallbackFault`].
pub(crate) fn invoke(name: &CallbackName, callback: &Callback, payload: &Payload) -> Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(payload))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::callback_fault(name.as_str(), e.to_string())),
        Err(panic) => Err(Error::callback_fault(name.as_str(), panic_message(&*panic))),
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}

// ============================================================================
// Remote
// ============================================================================

/// Handle for calling operations on the daemon.
///
/// Cheap to clone. Calls never block: results are delivered to the call's
/// continuation, or to the operation's mapped callback.
#[derive(Clone)]
pub struct Remote {
    namespace: Arc<Mutex<Namespace>>,
    outbound: mpsc::UnboundedSender<OutboundRequest>,
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote")
            .field("methods", &self.methods())
            .finish_non_exhaustive()
    }
}

impl Remote {
    pub(crate) fn new(
        namespace: Arc<Mutex<Namespace>>,
        outbound: mpsc::UnboundedSender<OutboundRequest>,
    ) -> Self {
        Self {
            namespace,
            outbound,
        }
    }

    /// Calls an operation by dispatcher name (`append`) or arity-specific
    /// name (`append_2`).
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownMethod`] if the surface has no such callable
    /// - [`Error::ConnectionClosed`] if the bridge has shut down
    pub fn call(&self, name: &str, args: Vec<Argument>) -> Result<CallOutcome> {
        let prepared = self.namespace.lock().prepare(name, args)?;

        match prepared {
            Prepared::Cached(value) => Ok(CallOutcome::Cached(value)),
            Prepared::Send(request) => {
                self.outbound
                    .send(request)
                    .map_err(|_| Error::ConnectionClosed)?;
                Ok(CallOutcome::Sent)
            }
        }
    }

    /// Cached result of a preemptive operation.
    #[must_use]
    pub fn cached(&self, name: &str) -> Option<Value> {
        self.namespace.lock().constant(name).cloned()
    }

    /// Returns `true` if `name` can be called.
    #[must_use]
    pub fn has_callable(&self, name: &str) -> bool {
        let namespace = self.namespace.lock();
        namespace.constant(name).is_some() || namespace.registry().contains(name)
    }

    /// Dispatcher names on the surface.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.namespace.lock().registry().names()
    }

    /// Returns `true` once the manifest has been installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.namespace.lock().registry().is_installed()
    }
}

// ============================================================================
// Tests
// ============================================================================
