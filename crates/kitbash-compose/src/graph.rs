//! Dependency graph management using `petgraph`.
//!
//! Builds a directed graph from extension requirements and resolves a
//! topological activation order. Among extensions that are ready at the
//! same time, the one with the smallest name goes first, so the order
//! never depends on insertion order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use kitbash_common::error::{KitbashError, Result};
use petgraph::Direction;
use petgraph::graph::NodeIndex;

/// A dependency graph of extensions.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Internal petgraph representation.
    graph: petgraph::Graph<String, ()>,
    /// Node of each extension name.
    nodes: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an extension node, returning the existing node if the name is
    /// already present.
    pub fn add_extension(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        if let Some(&index) = self.nodes.get(&name) {
            return index;
        }
        let index = self.graph.add_node(name.clone());
        let _ = self.nodes.insert(name, index);
        index
    }

    /// Adds a dependency edge: `dependent` comes after `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent` so that the
    /// topological order yields dependencies first. Repeated edges are
    /// stored once.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.update_edge(dependency, dependent, ());
    }

    /// Number of extensions in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no extensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns the activation order of all extensions.
    ///
    /// Kahn's algorithm with the ready set ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`KitbashError::DependencyCycle`] naming the members of
    /// every cycle if the graph is not acyclic.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|index| {
                let incoming = self
                    .graph
                    .neighbors_directed(index, Direction::Incoming)
                    .count();
                (index, incoming)
            })
            .collect();

        let mut ready: BTreeSet<(&str, NodeIndex)> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&index, _)| (self.graph[index].as_str(), index))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((name, index)) = ready.pop_first() {
            order.push(name.to_string());
            for next in self.graph.neighbors_directed(index, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        let _ = ready.insert((self.graph[next].as_str(), next));
                    }
                }
            }
        }

        if order.len() == self.graph.node_count() {
            Ok(order)
        } else {
            Err(KitbashError::DependencyCycle {
                members: self.cycle_members(),
            })
        }
    }

    /// Names of every extension that sits on a cycle, sorted.
    fn cycle_members(&self) -> Vec<String> {
        let members: BTreeSet<&str> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [single] => self.graph.contains_edge(*single, *single),
                _ => true,
            })
            .flatten()
            .map(|index| self.graph[index].as_str())
            .collect();
        members.into_iter().map(str::to_string).collect()
    }
}
