//! # kitbash-extension
//!
//! The extension contract and the capabilities that ship with kitbash.
//!
//! Provides:
//! - **Extension**: the trait every capability implements.
//! - **Environment**: base image classification and per-extension
//!   (distro, version) dispatch tables.
//! - **Host**: queries about the machine kitbash runs on (user account,
//!   container engine version).
//! - **Registry**: the explicit name-to-factory mapping built at start-up.
//! - **Builtin**: display forwarding, GPU drivers, CUDA, user mapping and
//!   the argument-only extensions.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builtin;
pub mod environment;
pub mod extension;
pub mod host;
pub mod registry;

pub use extension::Extension;
pub use registry::{ExtensionFactory, ExtensionRegistry};
