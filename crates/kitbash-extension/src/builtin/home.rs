//! Mount the host home directory at the same path.

use kitbash_common::error::Result;
use kitbash_common::types::Arguments;

use super::quote;
use crate::extension::{Extension, precondition_error};
use crate::host;

/// Shares the invoking user's home directory with the container.
#[derive(Debug, Clone, Copy, Default)]
pub struct Home;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(Home)
}

impl Extension for Home {
    fn name(&self) -> &'static str {
        "home"
    }

    fn description(&self) -> &'static str {
        "Mount the host home directory into the container"
    }

    fn precondition(&self, _args: &Arguments) -> Result<()> {
        match host::home_dir() {
            Some(home) if home.is_dir() => Ok(()),
            Some(home) => Err(precondition_error(
                self.name(),
                format!("home directory {} does not exist", home.display()),
            )),
            None => Err(precondition_error(self.name(), "HOME is not set")),
        }
    }

    fn docker_run_args(&self, _args: &Arguments) -> Result<String> {
        let home = host::home_dir()
            .ok_or_else(|| precondition_error(self.name(), "HOME is not set"))?;
        let mount = format!("{0}:{0}", home.display());
        Ok(format!(" -v {}", quote(&mount)))
    }
}
