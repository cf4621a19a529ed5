//! Bind mount host paths into the container.

use clap::{Arg, ArgAction};
use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::Arguments;

use super::quote;
use crate::extension::Extension;
use crate::host;

/// Adds `-v` flags for each `--volume` value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Volume;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(Volume)
}

impl Volume {
    /// Expands the host side of a `HOST[:CONTAINER[:OPTIONS]]` mount.
    ///
    /// A mount without a container path is mounted at the host path.
    ///
    /// # Errors
    ///
    /// Returns an error if the host path cannot be made absolute.
    pub fn expand(spec: &str) -> Result<String> {
        let mut parts = spec.splitn(2, ':');
        let host_part = parts.next().unwrap_or_default();
        if host_part.is_empty() {
            return Err(KitbashError::Config {
                message: format!("volume '{spec}' has no host path"),
            });
        }
        let host_path = host::absolute_host_path(host_part)?.display().to_string();
        Ok(match parts.next() {
            Some(rest) => format!("{host_path}:{rest}"),
            None => format!("{host_path}:{host_path}"),
        })
    }
}

impl Extension for Volume {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn description(&self) -> &'static str {
        "Bind mount a host path (HOST[:CONTAINER[:OPTIONS]])"
    }

    fn arguments(&self) -> Vec<Arg> {
        vec![
            Arg::new(self.name())
                .long(self.name())
                .value_name("HOST[:CONTAINER[:OPTIONS]]")
                .action(ArgAction::Append)
                .help(self.description()),
        ]
    }

    fn docker_run_args(&self, args: &Arguments) -> Result<String> {
        let mut out = String::new();
        for spec in args.list(self.name()) {
            out.push_str(&format!(" -v {}", quote(&Self::expand(spec)?)));
        }
        Ok(out)
    }
}
