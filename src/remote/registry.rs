//! Method registry built from the daemon's manifest.
//!
//! Each manifest entry contributes one arity-specific callable,
//! `name_<n>`. Entries sharing a name (overloads) are grouped under one
//! arity dispatcher, `name`, which picks the overload from the number of
//! positional arguments.
//!
//! ```text
//! manifest                      registry
//! ─────────────────────         ────────────────────────────────
//! append(1) -> void       ──►   append   ─┬─► append_1
//! append(2) -> void       ──►             └─► append_2
//! print(0)  -> void       ──►   print    ───► print_0
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::MethodDescriptor;

use super::surface::{Argument, Continuation};

// ============================================================================
// CallableEntry
// ============================================================================

/// Dispatch record for one `(name, arity)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableEntry {
    /// Operation name.
    pub name: String,
    /// Number of positional parameters.
    pub arity: usize,
    /// Declared return type.
    pub return_type: String,
}

impl CallableEntry {
    /// Name of the arity-specific callable, e.g. `append_2`.
    #[must_use]
    pub fn mangled_name(&self) -> String {
        format!("{}_{}", self.name, self.arity)
    }

    /// Splits call arguments into exactly `arity` parameters and an
    /// optional trailing continuation.
    ///
    /// Missing parameters are sent as `null`; extra ones are dropped. A
    /// continuation in a positional slot is sent as `null`.
    #[must_use]
    pub fn bind(&self, mut args: Vec<Argument>) -> (Vec<Value>, Option<Continuation>) {
        let continuation = match args.last() {
            Some(Argument::Continuation(_)) => match args.pop() {
                Some(Argument::Continuation(c)) => Some(c),
                _ => None,
            },
            _ => None,
        };

        let mut params: Vec<Value> = args
            .into_iter()
            .take(self.arity)
            .map(Argument::into_value)
            .collect();
        params.resize(self.arity, Value::Null);

        (params, continuation)
    }
}

// ============================================================================
// MethodRegistry
// ============================================================================

/// Table of callables derived from the manifest.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    entries: FxHashMap<String, BTreeMap<usize, CallableEntry>>,
    installed: bool,
}

impl MethodRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every manifest entry.
    ///
    /// Returns the number of arity-specific callables registered.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if a manifest was already installed.
    pub fn install(&mut self, manifest: Vec<MethodDescriptor>) -> Result<usize> {
        if self.installed {
            return Err(Error::protocol("manifest received twice in one session"));
        }
        self.installed = true;

        let count = manifest.len();
        for descriptor in manifest {
            debug!(
                name = %descriptor.name,
                arity = descriptor.parameter_count,
                returns = %descriptor.return_type,
                "Registering remote method"
            );
            let entry = CallableEntry {
                name: descriptor.name.clone(),
                arity: descriptor.parameter_count,
                return_type: descriptor.return_type,
            };
            self.entries
                .entry(descriptor.name)
                .or_default()
                .insert(entry.arity, entry);
        }

        Ok(count)
    }

    /// Returns `true` once a manifest has been installed.
    #[inline]
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        self.installed
    }

    /// Resolves a callable by dispatcher name or by `name_<n>`.
    ///
    /// The dispatcher counts positional arguments, not counting a trailing
    /// continuation.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMethod`] if no callable matches.
    pub fn resolve(&self, name: &str, args: &[Argument]) -> Result<&CallableEntry> {
        if let Some(overloads) = self.entries.get(name) {
            let count = positional_count(args);
            return overloads
                .get(&count)
                .ok_or_else(|| Error::unknown_method(format!("{name}_{count}")));
        }

        if let Some((base, arity)) = name.rsplit_once('_')
            && let Ok(arity) = arity.parse::<usize>()
            && let Some(entry) = self.entries.get(base).and_then(|o| o.get(&arity))
        {
            return Ok(entry);
        }

        Err(Error::unknown_method(name))
    }

    /// Returns `true` if `name` is a dispatcher or an arity-specific callable.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return true;
        }
        name.rsplit_once('_')
            .and_then(|(base, arity)| Some((base, arity.parse::<usize>().ok()?)))
            .is_some_and(|(base, arity)| {
                self.entries.get(base).is_some_and(|o| o.contains_key(&arity))
            })
    }

    /// Dispatcher names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// All arity-specific entries for `name`.
    #[must_use]
    pub fn overloads(&self, name: &str) -> Vec<&CallableEntry> {
        self.entries
            .get(name)
            .map(|o| o.values().collect())
            .unwrap_or_default()
    }

    /// Forgets the manifest.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.installed = false;
    }
}

/// Number of arguments excluding a trailing continuation.
fn positional_count(args: &[Argument]) -> usize {
    match args.last() {
        Some(Argument::Continuation(_)) => args.len() - 1,
        _ => args.len(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn descriptor(name: &str, parameters: usize) -> MethodDescriptor {
        MethodDescriptor {
            name: name.to_string(),
            parameter_count: parameters,
            return_type: "void".to_string(),
        }
    }

    fn registry() -> MethodRegistry {
        let mut registry = MethodRegistry::new();
        registry
            .install(vec![
                descriptor("foo", 1),
                descriptor("append", 1),
                descriptor("append", 2),
                descriptor("print", 0),
            ])
            .expect("install");
        registry
    }

    #[test]
    fn test_manifest_creates_dispatcher_and_arity_callable() {
        let registry = registry();
        assert!(registry.contains("foo"));
        assert!(registry.contains("foo_1"));
        assert!(!registry.contains("foo_2"));
        assert!(!registry.contains("bar"));
    }

    #[test]
    fn test_dispatch_by_argument_count() {
        let registry = registry();

        let one = registry
            .resolve("append", &[Argument::value("^XA")])
            .expect("resolve");
        assert_eq!(one.mangled_name(), "append_1");

        let two = registry
            .resolve(
                "append",
                &[
                    Argument::value("^XA"),
                    Argument::value(2),
                    Argument::Continuation(Continuation::unnamed(|_| Ok(()))),
                ],
            )
            .expect("resolve");
        assert_eq!(two.mangled_name(), "append_2");
    }

    #[test]
    fn test_unknown_arity() {
        let err = registry().resolve("print", &[Argument::value(1)]).unwrap_err();
        assert!(matches!(err, Error::UnknownMethod { ref name } if name == "print_1"));
    }

    #[test]
    fn test_resolve_mangled_name() {
        let registry = registry();
        let entry = registry
            .resolve("append_2", &[Argument::value("a")])
            .expect("resolve");
        assert_eq!(entry.arity, 2);
        assert!(registry.resolve("append_3", &[]).is_err());
    }

    #[test]
    fn test_second_manifest_is_rejected() {
        let mut registry = registry();
        let err = registry.install(vec![descriptor("bar", 0)]).unwrap_err();
        assert!(err.is_protocol_error());
        assert!(!registry.contains("bar"));
    }

    #[test]
    fn test_bind_pads_and_truncates() {
        let entry = CallableEntry {
            name: "append".to_string(),
            arity: 2,
            return_type: "void".to_string(),
        };

        let (params, continuation) = entry.bind(vec![Argument::value("a")]);
        assert_eq!(params, vec![json!("a"), Value::Null]);
        assert!(continuation.is_none());

        let (params, continuation) = entry.bind(vec![
            Argument::value("a"),
            Argument::value("b"),
            Argument::value("c"),
            Argument::Continuation(Continuation::named("done", |_| Ok(()))),
        ]);
        assert_eq!(params, vec![json!("a"), json!("b")]);
        assert!(continuation.is_some());
    }

    #[test]
    fn test_names_and_overloads() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["append", "foo", "print"]);
        assert_eq!(registry.overloads("append").len(), 2);
        assert!(registry.overloads("missing").is_empty());
    }
}
