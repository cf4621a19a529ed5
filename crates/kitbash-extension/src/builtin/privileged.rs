//! Run the container privileged.

use kitbash_common::error::Result;
use kitbash_common::types::Arguments;

use crate::extension::Extension;

/// Adds `--privileged`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Privileged;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(Privileged)
}

impl Extension for Privileged {
    fn name(&self) -> &'static str {
        "privileged"
    }

    fn description(&self) -> &'static str {
        "Give the container extended privileges"
    }

    fn docker_run_args(&self, _args: &Arguments) -> Result<String> {
        Ok(" --privileged".to_string())
    }
}
