//! System-wide constants and default paths.

use std::path::PathBuf;

/// Application name used in log output and generated file names.
pub const APP_NAME: &str = "kitbash";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "kitbash";

/// Exit status for a base image no active extension can handle.
pub const UNSUPPORTED_ENVIRONMENT_EXIT_CODE: i32 = 1;

/// Default container engine executable.
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Default repository prefix of generated image tags.
pub const DEFAULT_IMAGE_PREFIX: &str = "kitbash";

/// Environment variable pointing at an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "KITBASH_CONFIG";

/// Name of the per-user configuration directory under `$HOME`.
pub const CONFIG_DIR_NAME: &str = ".kitbash";

/// File name of the configuration file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Number of hex characters of the content hash kept in generated tags.
pub const TAG_HASH_LENGTH: usize = 12;

/// Well-known argument keys shared by the orchestrator and the CLI.
pub mod keys {
    /// Base image reference.
    pub const BASE_IMAGE: &str = "base_image";
    /// Explicit tag for the built image.
    pub const IMAGE_NAME: &str = "image_name";
    /// Run mode (`interactive`, `non-interactive`, `dry-run`).
    pub const MODE: &str = "mode";
    /// Disable the engine's build cache.
    pub const NOCACHE: &str = "nocache";
    /// Always pull a newer base image while building.
    pub const PULL: &str = "pull";
    /// Network used only during the build.
    pub const BUILD_NETWORK: &str = "build_network";
    /// Network of the container, also used during the build unless a
    /// build network is given.
    pub const NETWORK: &str = "network";
    /// Keep host-side artifacts created by preconditions.
    pub const NOCLEANUP: &str = "nocleanup";
    /// Command run inside the container.
    pub const COMMAND: &str = "command";
    /// Server version reported by the container engine, recorded by the
    /// orchestrator before run arguments are collected.
    pub const ENGINE_VERSION: &str = "engine_version";
}

/// Returns the default configuration file path, `$HOME/.kitbash/config.yaml`.
///
/// Returns `None` when no home directory can be determined.
pub fn default_config_file() -> Option<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(|home| {
            PathBuf::from(home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME)
        })
}
