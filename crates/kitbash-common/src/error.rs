//! Unified error types for the kitbash workspace.
//!
//! The variants follow the activation error taxonomy: configuration
//! errors and environment mismatches are fatal before any engine call,
//! while build and run failures are reported as exit statuses and never
//! appear here.

use std::path::PathBuf;

use thiserror::Error;

use crate::constants::UNSUPPORTED_ENVIRONMENT_EXIT_CODE;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum KitbashError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path (or program) where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Extensions depend on each other in a loop.
    #[error("cyclic extension dependency between: {}", members.join(", "))]
    DependencyCycle {
        /// Names of the extensions forming the cycle, sorted.
        members: Vec<String>,
    },

    /// The base image is not an environment the extension can handle.
    #[error("extension '{extension}' does not support base image '{image}': {reason}")]
    UnsupportedEnvironment {
        /// Extension that rejected the base image.
        extension: String,
        /// Base image reference as given.
        image: String,
        /// Why the image was rejected.
        reason: String,
    },

    /// Host-side setup for an extension failed.
    #[error("precondition of extension '{extension}' failed: {message}")]
    Precondition {
        /// Extension whose precondition failed.
        extension: String,
        /// Description of the failure.
        message: String,
    },

    /// Template rendering failed.
    #[error("template error: {message}")]
    Template {
        /// Description of the rendering failure.
        message: String,
    },

    /// The container engine could not be driven.
    #[error("container engine error: {message}")]
    Engine {
        /// Description of the engine failure.
        message: String,
    },

    /// A configuration file could not be parsed.
    #[error("configuration parse error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

impl KitbashError {
    /// Process exit status a command-line front end should terminate with.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedEnvironment { .. } => UNSUPPORTED_ENVIRONMENT_EXIT_CODE,
            _ => 1,
        }
    }

    /// Returns whether this error is an environment mismatch.
    #[must_use]
    pub const fn is_unsupported_environment(&self) -> bool {
        matches!(self, Self::UnsupportedEnvironment { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, KitbashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_environment_exits_with_one() {
        let err = KitbashError::UnsupportedEnvironment {
            extension: "nvidia".into(),
            image: "fedora".into(),
            reason: "unknown distribution".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.is_unsupported_environment());
    }

    #[test]
    fn cycle_message_lists_members() {
        let err = KitbashError::DependencyCycle {
            members: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "cyclic extension dependency between: a, b");
        assert!(!err.is_unsupported_environment());
    }

    #[test]
    fn not_found_message_names_resource() {
        let err = KitbashError::NotFound {
            kind: "extension",
            id: "gpu".into(),
        };
        assert_eq!(err.to_string(), "extension not found: gpu");
    }
}
