//! Container engine abstraction.

use kitbash_common::error::Result;
use kitbash_common::types::EngineVersion;

/// An image build submitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Tag given to the built image.
    pub tag: String,
    /// Complete Dockerfile text.
    pub dockerfile: String,
    /// Ignore the layer cache.
    pub nocache: bool,
    /// Always pull newer base images.
    pub pull: bool,
    /// Network used by `RUN` steps.
    pub network: Option<String>,
}

/// A container launch submitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Image to launch.
    pub tag: String,
    /// Launch flags, already split into words.
    pub args: Vec<String>,
    /// Command run inside the container; empty keeps the image default.
    pub command: Vec<String>,
    /// Attach a TTY and stdin.
    pub interactive: bool,
}

/// A container engine able to build, run and remove images.
///
/// Calls block until the engine finishes and are never retried. Build and
/// run failures are reported as exit statuses; errors mean the engine
/// could not be driven at all.
pub trait ContainerEngine: Send + Sync {
    /// Builds an image, passing every output line to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the build cannot be started.
    fn build(&self, request: &BuildRequest, sink: &mut dyn FnMut(&str)) -> Result<i32>;

    /// Launches a container and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    fn run(&self, request: &RunRequest) -> Result<i32>;

    /// Removes an image. An absent image is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing image cannot be removed.
    fn remove_image(&self, tag: &str) -> Result<()>;

    /// Server version of the engine, if it can be queried.
    fn version(&self) -> Option<EngineVersion>;
}
