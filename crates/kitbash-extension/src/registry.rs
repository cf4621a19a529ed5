//! Name-keyed registry of available extensions.
//!
//! The registry is populated explicitly at start-up; there is no runtime
//! discovery. Each entry is a factory so that every activation works on
//! fresh extension instances.

use std::collections::BTreeMap;

use kitbash_common::error::{KitbashError, Result};

use crate::builtin;
use crate::extension::Extension;

/// Creates a fresh extension instance.
pub type ExtensionFactory = fn() -> Box<dyn Extension>;

/// Mapping from extension name to factory, iterated in name order.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    factories: BTreeMap<&'static str, ExtensionFactory>,
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in extension.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for factory in builtin::FACTORIES {
            // Built-in names are unique.
            let _ = registry.register(*factory);
        }
        registry
    }

    /// Adds an extension factory under the name its instances report.
    ///
    /// # Errors
    ///
    /// Returns an error if an extension with the same name is registered.
    pub fn register(&mut self, factory: ExtensionFactory) -> Result<()> {
        let name = factory().name();
        if self.factories.contains_key(name) {
            return Err(KitbashError::Config {
                message: format!("extension '{name}' is registered twice"),
            });
        }
        let _ = self.factories.insert(name, factory);
        tracing::trace!(extension = name, "registered extension");
        Ok(())
    }

    /// Removes the named extensions, returning the remaining registry.
    #[must_use]
    pub fn without<S: AsRef<str>>(mut self, blocked: &[S]) -> Self {
        for name in blocked {
            if self.factories.remove(name.as_ref()).is_some() {
                tracing::debug!(extension = name.as_ref(), "extension blocked");
            }
        }
        self
    }

    /// Returns the name-to-factory mapping.
    #[must_use]
    pub const fn list(&self) -> &BTreeMap<&'static str, ExtensionFactory> {
        &self.factories
    }

    /// Iterates over registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Returns whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Creates a fresh instance of the named extension.
    ///
    /// # Errors
    ///
    /// Returns [`KitbashError::NotFound`] if `name` is not registered.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Extension>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| KitbashError::NotFound {
                kind: "extension",
                id: name.to_string(),
            })
    }

    /// Creates a fresh instance of every registered extension.
    #[must_use]
    pub fn instantiate_all(&self) -> Vec<Box<dyn Extension>> {
        self.factories.values().map(|factory| factory()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_lists_core_extensions() {
        let registry = ExtensionRegistry::builtin();
        for name in ["cuda", "nvidia", "user", "x11"] {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[test]
    fn instances_report_their_key() {
        let registry = ExtensionRegistry::builtin();
        for (name, factory) in registry.list() {
            assert_eq!(factory().name(), *name);
        }
    }

    #[test]
    fn names_are_sorted() {
        let registry = ExtensionRegistry::builtin();
        let names: Vec<_> = registry.names().collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ExtensionRegistry::builtin();
        let err = registry.register(builtin::FACTORIES[0]).unwrap_err();
        assert!(err.to_string().contains("registered twice"));
    }

    #[test]
    fn unknown_extension_is_not_found() {
        let err = ExtensionRegistry::builtin().instantiate("holodeck").unwrap_err();
        assert!(matches!(err, KitbashError::NotFound { kind: "extension", .. }));
    }

    #[test]
    fn blocked_extensions_are_removed() {
        let registry = ExtensionRegistry::builtin().without(&["privileged"]);
        assert!(!registry.contains("privileged"));
        assert!(registry.contains("x11"));
    }

    #[test]
    fn every_extension_registers_its_activation_argument() {
        for extension in ExtensionRegistry::builtin().instantiate_all() {
            let ids: Vec<String> = extension
                .arguments()
                .iter()
                .map(|arg| arg.get_id().to_string())
                .collect();
            assert!(
                ids.iter().any(|id| id == extension.name()),
                "{} lacks its activation argument: {ids:?}",
                extension.name()
            );
        }
    }
}
