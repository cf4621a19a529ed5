//! Image builds and container launches for kitbash activations.
//!
//! Handles:
//! - **Backend**: the `ContainerEngine` abstraction and its requests.
//! - **Docker**: the engine client driving the `docker` command line.
//! - **Tag**: deterministic image tags per activation.
//! - **Generator**: the orchestrator running preconditions, composition,
//!   build, run and cleanup.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod docker;
pub mod generator;
pub mod tag;

pub use backend::{BuildRequest, ContainerEngine, RunRequest};
pub use docker::DockerCli;
pub use generator::ImageGenerator;
