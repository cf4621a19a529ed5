//! Attach the container to a network.

use clap::Arg;
use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::Arguments;

use super::quote;
use crate::extension::Extension;

/// Adds `--network`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Network;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(Network)
}

impl Extension for Network {
    fn name(&self) -> &'static str {
        "network"
    }

    fn description(&self) -> &'static str {
        "Network the container joins (bridge, host, none or a user network)"
    }

    fn arguments(&self) -> Vec<Arg> {
        vec![
            Arg::new(self.name())
                .long(self.name())
                .value_name("NETWORK")
                .help(self.description()),
        ]
    }

    fn docker_run_args(&self, args: &Arguments) -> Result<String> {
        let network = args.text(self.name()).ok_or_else(|| KitbashError::Config {
            message: "--network needs a value".into(),
        })?;
        Ok(format!(" --network {}", quote(network)))
    }
}
