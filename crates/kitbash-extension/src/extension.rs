//! The extension contract.

use std::collections::BTreeSet;

use clap::{Arg, ArgAction};
use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::Arguments;
use kitbash_template::Substitutions;

/// A pluggable capability contributing build-time and run-time fragments.
///
/// Implementations hold no state between calls: everything they need is
/// derived from the [`Arguments`] of the activation, so every query is
/// idempotent for identical arguments. Within one activation the
/// orchestrator calls, in order: [`required_extensions`], [`precondition`],
/// [`environment_substitutions`], then [`preamble`], [`snippet`] and
/// [`docker_run_args`] in any order, and finally [`cleanup`].
///
/// [`required_extensions`]: Extension::required_extensions
/// [`precondition`]: Extension::precondition
/// [`environment_substitutions`]: Extension::environment_substitutions
/// [`preamble`]: Extension::preamble
/// [`snippet`]: Extension::snippet
/// [`docker_run_args`]: Extension::docker_run_args
/// [`cleanup`]: Extension::cleanup
pub trait Extension: Send + Sync {
    /// Stable identity, also the extension's CLI flag and argument key.
    fn name(&self) -> &'static str;

    /// One-line description shown in help output.
    fn description(&self) -> &'static str;

    /// Command-line arguments this extension registers.
    ///
    /// The argument whose id equals [`name`](Extension::name) activates the
    /// extension. The default is a plain `--<name>` switch.
    fn arguments(&self) -> Vec<Arg> {
        vec![
            Arg::new(self.name())
                .long(self.name())
                .action(ArgAction::SetTrue)
                .help(self.description()),
        ]
    }

    /// Names of extensions this one cannot work without.
    fn required_extensions(&self, _args: &Arguments) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Names of extensions this one must follow when both are active.
    fn invoke_after(&self, _args: &Arguments) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Prepares the host before any build or run.
    ///
    /// # Errors
    ///
    /// Returns an error if host-side setup fails; the activation is aborted.
    fn precondition(&self, _args: &Arguments) -> Result<()> {
        Ok(())
    }

    /// Fragment emitted before the base image directive.
    ///
    /// # Errors
    ///
    /// Returns an error if the base image is unsupported.
    fn preamble(&self, _args: &Arguments) -> Result<String> {
        Ok(String::new())
    }

    /// Placeholder table derived from the base image.
    ///
    /// # Errors
    ///
    /// Returns [`KitbashError::UnsupportedEnvironment`] if the base image
    /// cannot be classified or is outside the supported set.
    fn environment_substitutions(&self, _args: &Arguments) -> Result<Substitutions> {
        Ok(Substitutions::new())
    }

    /// Dockerfile body fragment emitted after the base image directive.
    ///
    /// # Errors
    ///
    /// Returns an error if the base image is unsupported.
    fn snippet(&self, _args: &Arguments) -> Result<String> {
        Ok(String::new())
    }

    /// Flags added to the container launch.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments or host state are invalid.
    fn docker_run_args(&self, _args: &Arguments) -> Result<String> {
        Ok(String::new())
    }

    /// Removes host-side artifacts created by the precondition.
    ///
    /// # Errors
    ///
    /// Returns an error if an artifact cannot be removed.
    fn cleanup(&self, _args: &Arguments) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name())
            .finish()
    }
}

/// Renders an extension's fragment template, treating unresolved
/// placeholders as an internal error of that extension.
///
/// # Errors
///
/// Returns [`KitbashError::Template`] if `template` uses a placeholder
/// missing from `table`.
pub fn render_fragment(extension: &str, template: &str, table: &Substitutions) -> Result<String> {
    kitbash_template::render(template, table).map_err(|e| KitbashError::Template {
        message: format!("extension '{extension}': {e}"),
    })
}

/// Builds a [`KitbashError::Precondition`] for `extension`.
pub fn precondition_error(extension: &str, message: impl Into<String>) -> KitbashError {
    KitbashError::Precondition {
        extension: extension.to_string(),
        message: message.into(),
    }
}

/// Returns a set holding the given names.
#[must_use]
pub fn names<const N: usize>(names: [&str; N]) -> BTreeSet<String> {
    names.into_iter().map(str::to_string).collect()
}
