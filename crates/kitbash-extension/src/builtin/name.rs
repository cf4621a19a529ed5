//! Name the launched container.

use clap::Arg;
use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::Arguments;

use super::quote;
use crate::extension::Extension;

/// Adds `--name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Name;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(Name)
}

impl Extension for Name {
    fn name(&self) -> &'static str {
        "name"
    }

    fn description(&self) -> &'static str {
        "Name of the launched container"
    }

    fn arguments(&self) -> Vec<Arg> {
        vec![
            Arg::new(self.name())
                .long(self.name())
                .value_name("NAME")
                .help(self.description()),
        ]
    }

    fn docker_run_args(&self, args: &Arguments) -> Result<String> {
        let name = args.text(self.name()).ok_or_else(|| KitbashError::Config {
            message: "--name needs a value".into(),
        })?;
        Ok(format!(" --name {}", quote(name)))
    }
}
