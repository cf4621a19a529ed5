//! CUDA toolkit injection from the NVIDIA package repositories.

use std::collections::BTreeSet;

use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::Arguments;
use kitbash_template::{Substitutions, substitutions};

use crate::environment::{self, DistroFamily, Release, SupportRow};
use crate::extension::{Extension, names, render_fragment};

/// Version of the `cuda-keyring` package that installs the repository key.
const KEYRING_VERSION: &str = "1.1-1";

/// Installation recipe per release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recipe {
    /// The repository only needs the keyring.
    Ubuntu,
    /// The driver packages live in `contrib`, which must be enabled first.
    DebianContrib,
}

const SUPPORT: &[SupportRow<Recipe>] = &[
    (DistroFamily::Ubuntu, "20.04", Recipe::Ubuntu),
    (DistroFamily::Ubuntu, "22.04", Recipe::Ubuntu),
    (DistroFamily::Ubuntu, "24.04", Recipe::Ubuntu),
    (DistroFamily::Debian, "11", Recipe::DebianContrib),
    (DistroFamily::Debian, "12", Recipe::DebianContrib),
];

const ENABLE_CONTRIB: &str = "\
# The CUDA repository depends on packages from contrib
RUN apt-get update \\
 && apt-get install -y --no-install-recommends software-properties-common \\
 && add-apt-repository -y contrib \\
 && rm -rf /var/lib/apt/lists/*
";

const INSTALL: &str = "\
# CUDA toolkit for @(download_osstring) @(download_verstring) (@(download_arch))
RUN apt-get update \\
 && apt-get install -y --no-install-recommends ca-certificates wget \\
 && wget -q https://developer.download.nvidia.com/compute/cuda/repos/@(download_osstring)@(download_verstring)/@(download_arch)/cuda-keyring_@(download_keyring)_all.deb \\
 && dpkg -i cuda-keyring_@(download_keyring)_all.deb \\
 && rm cuda-keyring_@(download_keyring)_all.deb \\
 && apt-get update \\
 && apt-get install -y --no-install-recommends cuda-toolkit \\
 && apt-get clean \\
 && rm -rf /var/lib/apt/lists/*
ENV PATH=/usr/local/cuda/bin${PATH:+:${PATH}}
ENV LD_LIBRARY_PATH=/usr/local/cuda/lib64${LD_LIBRARY_PATH:+:${LD_LIBRARY_PATH}}
";

/// Installs the CUDA toolkit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cuda;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(Cuda)
}

impl Cuda {
    fn classify(self, args: &Arguments) -> Result<(Release, Recipe)> {
        environment::dispatch(self.name(), args, SUPPORT)
    }
}

/// Repository architecture directory for the host CPU.
fn download_arch(extension: &str, args: &Arguments) -> Result<&'static str> {
    match std::env::consts::ARCH {
        "x86_64" => Ok("x86_64"),
        "aarch64" => Ok("sbsa"),
        other => Err(KitbashError::UnsupportedEnvironment {
            extension: extension.to_string(),
            image: args.base_image().unwrap_or_default().to_string(),
            reason: format!("no CUDA repository for architecture {other}"),
        }),
    }
}

impl Extension for Cuda {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn description(&self) -> &'static str {
        "Install the NVIDIA CUDA toolkit"
    }

    fn invoke_after(&self, _args: &Arguments) -> BTreeSet<String> {
        names(["nvidia"])
    }

    fn environment_substitutions(&self, args: &Arguments) -> Result<Substitutions> {
        let (release, _) = self.classify(args)?;
        let verstring = match release.family {
            DistroFamily::Ubuntu => release.version.replace('.', ""),
            DistroFamily::Debian => release.version.to_string(),
        };
        Ok(substitutions([
            ("download_osstring", release.family.id().to_string()),
            ("download_verstring", verstring),
            ("download_arch", download_arch(self.name(), args)?.to_string()),
            ("download_keyring", KEYRING_VERSION.to_string()),
        ]))
    }

    fn snippet(&self, args: &Arguments) -> Result<String> {
        let (_, recipe) = self.classify(args)?;
        let table = self.environment_substitutions(args)?;
        let install = render_fragment(self.name(), INSTALL, &table)?;
        Ok(match recipe {
            Recipe::Ubuntu => install,
            Recipe::DebianContrib => format!("{ENABLE_CONTRIB}{install}"),
        })
    }
}
