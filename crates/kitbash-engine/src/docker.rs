//! Container engine client backed by the `docker` command line.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;

use kitbash_common::constants::APP_NAME;
use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::EngineVersion;

use crate::backend::{BuildRequest, ContainerEngine, RunRequest};

/// Drives the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    /// Creates a client for `binary`, a name looked up on `PATH` or a path.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Creates a client for `binary` after checking it can be found.
    ///
    /// # Errors
    ///
    /// Returns [`KitbashError::NotFound`] if the binary is not on `PATH`.
    pub fn locate(binary: &Path) -> Result<Self> {
        let found = which::which(binary).map_err(|_| KitbashError::NotFound {
            kind: "container engine binary",
            id: binary.display().to_string(),
        })?;
        tracing::debug!(binary = %found.display(), "located container engine");
        Ok(Self::new(found))
    }

    /// The binary this client runs.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn io_error(&self, source: std::io::Error) -> KitbashError {
        KitbashError::Io {
            path: self.binary.clone(),
            source,
        }
    }
}

/// Command line of `docker build` for `request` with `context` as the
/// build context directory.
#[must_use]
pub fn build_args(request: &BuildRequest, context: &Path) -> Vec<String> {
    let mut args = vec!["build".to_string()];
    if request.nocache {
        args.push("--no-cache".into());
    }
    if request.pull {
        args.push("--pull".into());
    }
    if let Some(network) = &request.network {
        args.push("--network".into());
        args.push(network.clone());
    }
    args.push("-t".into());
    args.push(request.tag.clone());
    args.push(context.display().to_string());
    args
}

/// Whether `stderr` of a failed `docker image inspect` reports an absent
/// image rather than an engine failure.
fn is_missing_image(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("no such image")
}

/// Command line of `docker run` for `request`.
#[must_use]
pub fn run_args(request: &RunRequest) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string()];
    if request.interactive {
        args.push("-it".into());
    }
    args.extend(request.args.iter().cloned());
    args.push(request.tag.clone());
    args.extend(request.command.iter().cloned());
    args
}

impl ContainerEngine for DockerCli {
    fn build(&self, request: &BuildRequest, sink: &mut dyn FnMut(&str)) -> Result<i32> {
        let context = tempfile::Builder::new()
            .prefix(&format!("{APP_NAME}-build-"))
            .tempdir()
            .map_err(|e| KitbashError::Io {
                path: std::env::temp_dir(),
                source: e,
            })?;
        let dockerfile = context.path().join("Dockerfile");
        std::fs::write(&dockerfile, &request.dockerfile).map_err(|e| KitbashError::Io {
            path: dockerfile.clone(),
            source: e,
        })?;

        let args = build_args(request, context.path());
        tracing::info!(tag = %request.tag, context = %context.path().display(), "building image");
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.io_error(e))?;

        let pipes: Vec<Box<dyn Read + Send>> = [
            child.stdout.take().map(|p| Box::new(p) as Box<dyn Read + Send>),
            child.stderr.take().map(|p| Box::new(p) as Box<dyn Read + Send>),
        ]
        .into_iter()
        .flatten()
        .collect();

        let (tx, rx) = mpsc::channel::<String>();
        std::thread::scope(|scope| {
            for pipe in pipes {
                let tx = tx.clone();
                let _ = scope.spawn(move || {
                    for line in BufReader::new(pipe).lines().map_while(std::io::Result::ok) {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);
            for line in rx {
                tracing::info!(target: "kitbash::build", "{line}");
                sink(&line);
            }
        });

        let status = child.wait().map_err(|e| self.io_error(e))?;
        let code = status.code().unwrap_or(-1);
        tracing::debug!(tag = %request.tag, code, "build finished");
        Ok(code)
    }

    fn run(&self, request: &RunRequest) -> Result<i32> {
        let args = run_args(request);
        tracing::info!(tag = %request.tag, command = %shell_words::join(&args), "starting container");
        let status = Command::new(&self.binary)
            .args(&args)
            .status()
            .map_err(|e| self.io_error(e))?;
        Ok(status.code().unwrap_or(-1))
    }

    fn remove_image(&self, tag: &str) -> Result<()> {
        let inspect = Command::new(&self.binary)
            .args(["image", "inspect", tag])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.io_error(e))?;
        if !inspect.status.success() {
            let stderr = String::from_utf8_lossy(&inspect.stderr);
            if is_missing_image(&stderr) {
                tracing::debug!(tag, "image not present, nothing to remove");
                return Ok(());
            }
            return Err(KitbashError::Engine {
                message: format!("inspecting image {tag} failed: {}", stderr.trim()),
            });
        }

        let output = Command::new(&self.binary)
            .args(["rmi", tag])
            .output()
            .map_err(|e| self.io_error(e))?;
        if output.status.success() {
            tracing::info!(tag, "removed image");
            Ok(())
        } else {
            Err(KitbashError::Engine {
                message: format!(
                    "removing image {tag} failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    fn version(&self) -> Option<EngineVersion> {
        kitbash_extension::host::engine_version(&self.binary)
    }
}
