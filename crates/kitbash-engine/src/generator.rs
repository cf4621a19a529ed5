//! The image generator orchestrating one activation.
//!
//! Build and run are separate steps so a caller can build without
//! running, or run an image built earlier. Host-side preconditions run
//! once, before whichever step comes first.

use kitbash_common::config::KitbashConfig;
use kitbash_common::constants::keys;
use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::{Arguments, RunMode};
use kitbash_compose::{ResolvedExtensionSet, collect_run_args, compose, resolve};
use kitbash_extension::ExtensionRegistry;

use crate::backend::{BuildRequest, ContainerEngine, RunRequest};
use crate::docker::{self, DockerCli};
use crate::tag::image_tag;

/// Builds and runs the image of one activation.
pub struct ImageGenerator {
    extensions: ResolvedExtensionSet,
    args: Arguments,
    mode: RunMode,
    tag: String,
    engine: Box<dyn ContainerEngine>,
    prepared: bool,
}

impl std::fmt::Debug for ImageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerator")
            .field("extensions", &self.extensions.names())
            .field("mode", &self.mode)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

impl ImageGenerator {
    /// Resolves `requested` and prepares an activation driven by the
    /// configured docker binary.
    ///
    /// # Errors
    ///
    /// Returns an error if no base image is given, an extension is unknown,
    /// dependencies form a cycle, or the run mode is invalid.
    pub fn new<S: AsRef<str>>(
        requested: &[S],
        registry: &ExtensionRegistry,
        args: Arguments,
        config: &KitbashConfig,
    ) -> Result<Self> {
        let base_image = args
            .base_image()
            .ok_or_else(|| KitbashError::Config {
                message: "no base image given".into(),
            })?
            .to_string();
        let extensions = resolve(requested, registry, &args)?;
        let mode = RunMode::from_args(&args, config.default_mode)?;
        let tag = match args.text(keys::IMAGE_NAME) {
            Some(name) => name.to_string(),
            None => image_tag(&config.image_prefix, &base_image, &extensions.names())?,
        };

        tracing::info!(
            base = %base_image,
            extensions = ?extensions.names(),
            tag = %tag,
            mode = %mode,
            "activation resolved"
        );
        Ok(Self {
            extensions,
            args,
            mode,
            tag,
            engine: Box::new(DockerCli::new(config.docker_binary.clone())),
            prepared: false,
        })
    }

    /// Replaces the container engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Box<dyn ContainerEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// The resolved extensions in activation order.
    #[must_use]
    pub const fn extensions(&self) -> &ResolvedExtensionSet {
        &self.extensions
    }

    /// The activation arguments.
    #[must_use]
    pub const fn arguments(&self) -> &Arguments {
        &self.args
    }

    /// Tag of the image this activation builds.
    #[must_use]
    pub fn image_tag(&self) -> &str {
        &self.tag
    }

    /// How the container is launched.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// Renders the Dockerfile without building it.
    ///
    /// # Errors
    ///
    /// Returns [`KitbashError::UnsupportedEnvironment`] if an extension
    /// rejects the base image, or the first error an extension reports.
    pub fn dockerfile(&self) -> Result<String> {
        compose(self.extensions.as_slice(), &self.args)?.render()
    }

    /// Runs every precondition once, in activation order.
    fn prepare(&mut self) -> Result<()> {
        if self.prepared {
            return Ok(());
        }
        for extension in self.extensions.iter() {
            tracing::debug!(extension = extension.name(), "running precondition");
            extension.precondition(&self.args)?;
        }
        self.prepared = true;
        Ok(())
    }

    /// Stores the engine's server version under [`keys::ENGINE_VERSION`]
    /// so extensions can pick version-dependent run flags.
    fn record_engine_version(&mut self) {
        if self.args.contains(keys::ENGINE_VERSION) {
            return;
        }
        match self.engine.version() {
            Some(version) => {
                tracing::debug!(%version, "container engine version");
                self.args.insert(keys::ENGINE_VERSION, version.to_string());
            }
            None => tracing::debug!("container engine version unknown"),
        }
    }

    /// Builds the image, logging the engine output.
    ///
    /// # Errors
    ///
    /// See [`build_with`](Self::build_with).
    pub fn build(&mut self) -> Result<i32> {
        self.build_with(&mut |_| {})
    }

    /// Builds the image, passing every engine output line to `sink`.
    ///
    /// Returns the engine's exit status unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if a precondition fails, the base image is not
    /// supported, or the engine cannot be started. The engine is not
    /// called in any of these cases.
    pub fn build_with(&mut self, sink: &mut dyn FnMut(&str)) -> Result<i32> {
        self.prepare()?;
        let dockerfile = self.dockerfile()?;
        tracing::debug!(tag = %self.tag, "composed Dockerfile:\n{dockerfile}");

        let request = BuildRequest {
            tag: self.tag.clone(),
            dockerfile,
            nocache: self.args.flag(keys::NOCACHE),
            pull: self.args.flag(keys::PULL),
            network: self
                .args
                .text(keys::BUILD_NETWORK)
                .or_else(|| self.args.text(keys::NETWORK))
                .map(str::to_string),
        };
        let code = self.engine.build(&request, sink)?;
        if code == 0 {
            tracing::info!(tag = %self.tag, "image built");
        } else {
            tracing::error!(tag = %self.tag, code, "image build failed");
        }
        Ok(code)
    }

    /// Launches the image with the `command` argument, if any.
    ///
    /// # Errors
    ///
    /// See [`run_command`](Self::run_command).
    pub fn run(&mut self) -> Result<i32> {
        let command: Vec<String> = self
            .args
            .list(keys::COMMAND)
            .into_iter()
            .map(str::to_string)
            .collect();
        self.run_command(&command)
    }

    /// Launches the image with `command`, returning its exit status
    /// unchanged.
    ///
    /// In dry-run mode the launch command is logged and 0 is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if a precondition fails, the launch arguments
    /// cannot be split into words, or the engine cannot be started.
    pub fn run_command(&mut self, command: &[String]) -> Result<i32> {
        self.prepare()?;
        self.record_engine_version();
        let run_args = collect_run_args(self.extensions.as_slice(), &self.args)?;
        let args = shell_words::split(&run_args).map_err(|e| KitbashError::Config {
            message: format!("malformed container arguments '{}': {e}", run_args.trim()),
        })?;
        let request = RunRequest {
            tag: self.tag.clone(),
            args,
            command: command.to_vec(),
            interactive: self.mode == RunMode::Interactive,
        };

        if self.mode == RunMode::DryRun {
            let line = std::iter::once("docker".to_string())
                .chain(docker::run_args(&request))
                .collect::<Vec<_>>();
            tracing::info!(command = %shell_words::join(&line), "dry run, container not started");
            return Ok(0);
        }
        let code = self.engine.run(&request)?;
        tracing::info!(tag = %self.tag, code, "container exited");
        Ok(code)
    }

    /// Removes the built image. An image that was never built is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing image cannot be removed.
    pub fn clear_image(&self) -> Result<()> {
        self.engine.remove_image(&self.tag)
    }

    /// Runs every extension's cleanup hook unless `nocleanup` is set.
    ///
    /// Every hook runs even if an earlier one fails; the first failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by a cleanup hook.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.args.flag(keys::NOCLEANUP) {
            tracing::info!("skipping extension cleanup");
            return Ok(());
        }
        let mut first_error = None;
        for extension in self.extensions.iter() {
            if let Err(e) = extension.cleanup(&self.args) {
                tracing::warn!(extension = extension.name(), error = %e, "cleanup failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        self.prepared = false;
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use kitbash_common::types::EngineVersion;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Engine calls seen by [`Recorder`].
    #[derive(Debug, Default)]
    struct Calls {
        builds: Vec<BuildRequest>,
        runs: Vec<RunRequest>,
        removed: Vec<String>,
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Calls>>,
        status: i32,
    }

    impl ContainerEngine for Recorder {
        fn build(&self, request: &BuildRequest, sink: &mut dyn FnMut(&str)) -> Result<i32> {
            sink("Step 1/1");
            self.calls.lock().unwrap().builds.push(request.clone());
            Ok(self.status)
        }

        fn run(&self, request: &RunRequest) -> Result<i32> {
            self.calls.lock().unwrap().runs.push(request.clone());
            Ok(self.status)
        }

        fn remove_image(&self, tag: &str) -> Result<()> {
            self.calls.lock().unwrap().removed.push(tag.to_string());
            Ok(())
        }

        fn version(&self) -> Option<EngineVersion> {
            Some(EngineVersion::new(24, 0, 7))
        }
    }

    fn generator(requested: &[&str], args: Arguments) -> (ImageGenerator, Recorder) {
        let recorder = Recorder::default();
        let generator = ImageGenerator::new(
            requested,
            &ExtensionRegistry::builtin(),
            args,
            &KitbashConfig::default(),
        )
        .expect("generator")
        .with_engine(Box::new(recorder.clone()));
        (generator, recorder)
    }

    #[test]
    fn build_submits_composed_dockerfile() {
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("nocache", true)
            .with("build_network", "host");
        let (mut generator, recorder) = generator(&[], args);

        let mut lines = Vec::new();
        let code = generator
            .build_with(&mut |line| lines.push(line.to_string()))
            .expect("build");
        assert_eq!(code, 0);
        assert_eq!(lines, vec!["Step 1/1"]);

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.builds.len(), 1);
        let request = &calls.builds[0];
        assert_eq!(request.dockerfile, "FROM ubuntu:jammy\n");
        assert_eq!(request.tag, generator.image_tag());
        assert!(request.nocache);
        assert!(!request.pull);
        assert_eq!(request.network.as_deref(), Some("host"));
    }

    #[test]
    fn container_network_is_used_for_build() {
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("network", "host");
        let (mut generator, recorder) = generator(&["network"], args);
        let _ = generator.build().expect("build");
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.builds[0].network.as_deref(), Some("host"));
    }

    #[test]
    fn build_status_passes_through() {
        let args = Arguments::new().with("base_image", "ubuntu:jammy");
        let recorder = Recorder {
            status: 17,
            ..Recorder::default()
        };
        let mut generator = ImageGenerator::new::<&str>(
            &[],
            &ExtensionRegistry::builtin(),
            args,
            &KitbashConfig::default(),
        )
        .expect("generator")
        .with_engine(Box::new(recorder));
        assert_eq!(generator.build().expect("build"), 17);
    }

    #[test]
    fn run_splits_extension_arguments_in_order() {
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("mode", "non-interactive")
            .with("env", vec!["GREETING=hello world".to_string()])
            .with("volume", vec!["/data:/data".to_string()])
            .with("command", vec!["echo".to_string(), "hi".to_string()]);
        let (mut generator, recorder) = generator(&["volume", "env"], args);

        assert_eq!(generator.run().expect("run"), 0);
        let calls = recorder.calls.lock().unwrap();
        let request = &calls.runs[0];
        assert_eq!(
            request.args,
            vec!["-e", "GREETING=hello world", "-v", "/data:/data"]
        );
        assert_eq!(request.command, vec!["echo", "hi"]);
        assert!(!request.interactive);
    }

    #[test]
    fn gpu_flag_follows_the_activation_engine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("mode", "non-interactive")
            .with("nvidia", "auto")
            .with("xauth_path", dir.path().join("x.xauth").display().to_string());
        let config = KitbashConfig {
            docker_binary: "/opt/custom/docker".into(),
            ..KitbashConfig::default()
        };
        let recorder = Recorder::default();
        let mut generator =
            ImageGenerator::new(&["nvidia"], &ExtensionRegistry::builtin(), args, &config)
                .expect("generator")
                .with_engine(Box::new(recorder.clone()));

        assert_eq!(generator.run_command(&[]).expect("run"), 0);
        assert_eq!(generator.arguments().text(keys::ENGINE_VERSION), Some("24.00.7"));
        let calls = recorder.calls.lock().unwrap();
        let run_args = &calls.runs[0].args;
        assert!(run_args.windows(2).any(|w| w == ["--gpus", "all"]), "{run_args:?}");
        assert!(!run_args.iter().any(|a| a == "--runtime=nvidia"), "{run_args:?}");
        drop(calls);
        generator.cleanup().expect("cleanup");
    }

    #[test]
    fn dry_run_never_starts_a_container() {
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("mode", "dry-run")
            .with("privileged", true);
        let (mut generator, recorder) = generator(&["privileged"], args);
        assert_eq!(generator.run_command(&[]).expect("run"), 0);
        assert!(recorder.calls.lock().unwrap().runs.is_empty());
    }

    #[test]
    fn image_name_overrides_tag() {
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("image_name", "my/image:dev");
        let (generator, _) = generator(&[], args);
        assert_eq!(generator.image_tag(), "my/image:dev");
    }

    #[test]
    fn clear_image_removes_tag() {
        let args = Arguments::new().with("base_image", "debian:bookworm");
        let (generator, recorder) = generator(&[], args);
        generator.clear_image().expect("clear");
        assert_eq!(
            recorder.calls.lock().unwrap().removed,
            vec![generator.image_tag().to_string()]
        );
    }

    #[test]
    fn missing_base_image_is_rejected() {
        let err = ImageGenerator::new(
            &["x11"],
            &ExtensionRegistry::builtin(),
            Arguments::new(),
            &KitbashConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, KitbashError::Config { .. }));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("mode", "sideways");
        let err = ImageGenerator::new::<&str>(
            &[],
            &ExtensionRegistry::builtin(),
            args,
            &KitbashConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, KitbashError::Config { .. }));
    }

    #[test]
    fn cleanup_respects_nocleanup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let xauth = dir.path().join("x.xauth");
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("mode", "dry-run")
            .with("xauth_path", xauth.display().to_string())
            .with("nocleanup", true);
        let (mut generator, _) = generator(&["x11"], args);
        let _ = generator.run().expect("run");
        generator.cleanup().expect("cleanup");
        assert!(xauth.exists());
    }

    #[test]
    fn cleanup_removes_precondition_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let xauth = dir.path().join("x.xauth");
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("mode", "dry-run")
            .with("xauth_path", xauth.display().to_string());
        let (mut generator, _) = generator(&["x11"], args);
        let _ = generator.run().expect("run");
        assert!(xauth.exists());
        generator.cleanup().expect("cleanup");
        assert!(!xauth.exists());
    }
}
