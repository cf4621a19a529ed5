//! # kitbash-compose
//!
//! Turns a set of requested extensions into an ordered activation and the
//! artifacts built from it.
//!
//! Handles:
//! - **Graph**: Dependency graph with deterministic topological ordering.
//! - **Resolver**: Transitive closure of extension requirements.
//! - **Dockerfile**: Composition of preambles, base directive and snippets,
//!   and collection of container launch arguments.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod dockerfile;
pub mod graph;
pub mod resolver;

pub use dockerfile::{ComposedBuildSpec, Fragment, collect_run_args, compose};
pub use resolver::{ResolvedExtensionSet, requested_names, resolve};
