//! Global configuration model for kitbash.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{CONFIG_ENV_VAR, DEFAULT_DOCKER_BINARY, DEFAULT_IMAGE_PREFIX};
use crate::error::{KitbashError, Result};
use crate::types::RunMode;

/// Root configuration for kitbash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitbashConfig {
    /// Container engine executable, looked up on `PATH` when relative.
    pub docker_binary: PathBuf,
    /// Repository prefix of generated image tags.
    pub image_prefix: String,
    /// Extensions that may never be activated.
    pub extension_blocklist: Vec<String>,
    /// Run mode used when none is requested.
    pub default_mode: RunMode,
}

impl Default for KitbashConfig {
    fn default() -> Self {
        Self {
            docker_binary: PathBuf::from(DEFAULT_DOCKER_BINARY),
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
            extension_blocklist: Vec::new(),
            default_mode: RunMode::default(),
        }
    }
}

impl KitbashConfig {
    /// Loads the configuration.
    ///
    /// The file named by `$KITBASH_CONFIG` must exist when the variable
    /// is set. Otherwise `$HOME/.kitbash/config.yaml` is read if present,
    /// and the defaults apply when it is not.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&explicit));
        }
        match crate::constants::default_config_file() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                tracing::debug!("no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| KitbashError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parses configuration from YAML text. Empty text yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Returns whether `extension` is blocked by this configuration.
    #[must_use]
    pub fn is_blocked(&self, extension: &str) -> bool {
        self.extension_blocklist.iter().any(|name| name == extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_docker() {
        let config = KitbashConfig::default();
        assert_eq!(config.docker_binary, PathBuf::from("docker"));
        assert_eq!(config.image_prefix, "kitbash");
        assert_eq!(config.default_mode, RunMode::Interactive);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = KitbashConfig::from_yaml("image_prefix: lab\n").expect("parse");
        assert_eq!(config.image_prefix, "lab");
        assert_eq!(config.docker_binary, PathBuf::from("docker"));
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = KitbashConfig::from_yaml("").expect("parse");
        assert_eq!(config, KitbashConfig::default());
    }

    #[test]
    fn full_yaml_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "docker_binary: /usr/local/bin/podman\n\
             extension_blocklist: [privileged]\n\
             default_mode: non-interactive\n",
        )
        .expect("write");

        let config = KitbashConfig::from_file(&path).expect("load");
        assert_eq!(config.docker_binary, PathBuf::from("/usr/local/bin/podman"));
        assert!(config.is_blocked("privileged"));
        assert!(!config.is_blocked("x11"));
        assert_eq!(config.default_mode, RunMode::NonInteractive);
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let err = KitbashConfig::from_yaml("default_mode: sideways\n").unwrap_err();
        assert!(matches!(err, KitbashError::Yaml { .. }), "got: {err}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = KitbashConfig::from_file(Path::new("/nonexistent/kitbash.yaml")).unwrap_err();
        assert!(matches!(err, KitbashError::Io { .. }));
    }
}
