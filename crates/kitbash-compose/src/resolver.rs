//! Extension requirement resolution.
//!
//! Expands the requested extensions with everything they transitively
//! require and orders the result so every extension follows its
//! dependencies. Soft ordering constraints (`invoke_after`) only apply
//! between extensions that are both active.

use std::collections::{BTreeMap, VecDeque};

use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::Arguments;
use kitbash_extension::{Extension, ExtensionRegistry};

use crate::graph::DependencyGraph;

/// Extension instances in activation order.
#[derive(Debug, Default)]
pub struct ResolvedExtensionSet {
    extensions: Vec<Box<dyn Extension>>,
}

impl ResolvedExtensionSet {
    /// Names in activation order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    /// Extensions in activation order.
    #[must_use]
    pub fn as_slice(&self) -> &[Box<dyn Extension>] {
        &self.extensions
    }

    /// Iterates the extensions in activation order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Extension> {
        self.extensions.iter().map(AsRef::as_ref)
    }

    /// Number of active extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether no extension is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// Names of the registered extensions that `args` requests, sorted.
#[must_use]
pub fn requested_names(registry: &ExtensionRegistry, args: &Arguments) -> Vec<&'static str> {
    registry
        .names()
        .filter(|name| args.is_requested(name))
        .collect()
}

/// Resolves `requested` against `registry` into an ordered extension set.
///
/// Each name is instantiated once; requirements are queried with `args`.
///
/// # Errors
///
/// Returns [`KitbashError::NotFound`] for a name missing from the
/// registry, naming the extension that required it, and
/// [`KitbashError::DependencyCycle`] if requirements or ordering
/// constraints form a loop.
pub fn resolve<S: AsRef<str>>(
    requested: &[S],
    registry: &ExtensionRegistry,
    args: &Arguments,
) -> Result<ResolvedExtensionSet> {
    let mut instances: BTreeMap<String, Box<dyn Extension>> = BTreeMap::new();
    let mut requirements: Vec<(String, String)> = Vec::new();
    let mut queue: VecDeque<(String, Option<String>)> = requested
        .iter()
        .map(|name| (name.as_ref().to_string(), None))
        .collect();

    while let Some((name, required_by)) = queue.pop_front() {
        if instances.contains_key(&name) {
            continue;
        }
        let extension = registry.instantiate(&name).map_err(|e| match (e, &required_by) {
            (KitbashError::NotFound { kind, id }, Some(parent)) => KitbashError::NotFound {
                kind,
                id: format!("{id} (required by '{parent}')"),
            },
            (e, _) => e,
        })?;
        for dependency in extension.required_extensions(args) {
            requirements.push((name.clone(), dependency.clone()));
            queue.push_back((dependency, Some(name.clone())));
        }
        let _ = instances.insert(name, extension);
    }

    let mut graph = DependencyGraph::new();
    let nodes: BTreeMap<&str, _> = instances
        .keys()
        .map(|name| (name.as_str(), graph.add_extension(name.as_str())))
        .collect();

    for (dependent, dependency) in &requirements {
        if let (Some(&from), Some(&to)) = (nodes.get(dependent.as_str()), nodes.get(dependency.as_str())) {
            graph.add_dependency(from, to);
        }
    }
    for (name, extension) in &instances {
        for earlier in extension.invoke_after(args) {
            if let (Some(&from), Some(&to)) = (nodes.get(name.as_str()), nodes.get(earlier.as_str())) {
                graph.add_dependency(from, to);
            }
        }
    }

    let order = graph.resolve_order()?;
    let extensions: Vec<Box<dyn Extension>> = order
        .iter()
        .filter_map(|name| instances.remove(name))
        .collect();

    tracing::debug!(order = ?order, "resolved extension order");
    Ok(ResolvedExtensionSet { extensions })
}
