//! Pass environment variables to the container.

use clap::{Arg, ArgAction};
use kitbash_common::error::Result;
use kitbash_common::types::Arguments;

use super::quote;
use crate::extension::Extension;

/// Adds `-e` flags for each `--env` value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Env;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(Env)
}

impl Extension for Env {
    fn name(&self) -> &'static str {
        "env"
    }

    fn description(&self) -> &'static str {
        "Set an environment variable in the container (NAME=VALUE or NAME to pass through)"
    }

    fn arguments(&self) -> Vec<Arg> {
        vec![
            Arg::new(self.name())
                .long(self.name())
                .value_name("NAME[=VALUE]")
                .action(ArgAction::Append)
                .help(self.description()),
        ]
    }

    fn docker_run_args(&self, args: &Arguments) -> Result<String> {
        Ok(args
            .list(self.name())
            .into_iter()
            .map(|entry| format!(" -e {}", quote(entry)))
            .collect())
    }
}
