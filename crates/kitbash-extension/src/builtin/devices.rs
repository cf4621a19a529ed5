//! Expose host devices to the container.

use std::path::Path;

use clap::{Arg, ArgAction};
use kitbash_common::error::Result;
use kitbash_common::types::Arguments;

use super::quote;
use crate::extension::Extension;

/// Adds `--device` flags for each existing `--devices` path.
#[derive(Debug, Clone, Copy, Default)]
pub struct Devices;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(Devices)
}

impl Extension for Devices {
    fn name(&self) -> &'static str {
        "devices"
    }

    fn description(&self) -> &'static str {
        "Expose a host device to the container; missing devices are skipped"
    }

    fn arguments(&self) -> Vec<Arg> {
        vec![
            Arg::new(self.name())
                .long(self.name())
                .value_name("DEVICE")
                .action(ArgAction::Append)
                .help(self.description()),
        ]
    }

    fn docker_run_args(&self, args: &Arguments) -> Result<String> {
        let mut out = String::new();
        for device in args.list(self.name()) {
            let host_path = device.split(':').next().unwrap_or(device);
            if Path::new(host_path).exists() {
                out.push_str(&format!(" --device {}", quote(device)));
            } else {
                tracing::warn!(device, "device not found on host, skipping");
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_devices_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let present = dir.path().join("card0");
        std::fs::write(&present, b"").expect("write");
        let present = present.display().to_string();

        let args = Arguments::new().with(
            "devices",
            vec![present.clone(), "/dev/kitbash-missing".to_string()],
        );
        let out = Devices.docker_run_args(&args).expect("args");
        assert_eq!(out, format!(" --device {present}"));
    }
}
