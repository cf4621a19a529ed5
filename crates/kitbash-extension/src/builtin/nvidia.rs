//! NVIDIA graphics driver injection.
//!
//! The image gets the glvnd dispatch libraries, either copied out of the
//! vendor `nvidia/opengl` image (16.04) or installed from the archive
//! with the vendor EGL configuration copied in (later releases). The
//! driver itself is mounted at run time by the NVIDIA container runtime.

use std::collections::BTreeSet;

use clap::{Arg, ArgAction, builder::PossibleValuesParser};
use kitbash_common::constants::keys;
use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::{Arguments, EngineVersion};
use kitbash_template::{Substitutions, substitutions};

use crate::environment::{self, DistroFamily, Release, SupportRow};
use crate::extension::{Extension, names, render_fragment};

/// Argument overriding the ubuntu release of the glvnd vendor image.
pub const GLVND_VERSION_ARG: &str = "nvidia_glvnd_version";

/// First engine release that understands `--gpus`.
pub const GPUS_FLAG_MIN_VERSION: EngineVersion = EngineVersion::new(19, 3, 0);

/// How glvnd reaches the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlvndInstall {
    /// Copy the libraries built into the vendor image.
    Copy,
    /// Install the distribution packages.
    Packages,
}

const SUPPORT: &[SupportRow<GlvndInstall>] = &[
    (DistroFamily::Ubuntu, "16.04", GlvndInstall::Copy),
    (DistroFamily::Ubuntu, "18.04", GlvndInstall::Packages),
    (DistroFamily::Ubuntu, "20.04", GlvndInstall::Packages),
    (DistroFamily::Ubuntu, "22.04", GlvndInstall::Packages),
    (DistroFamily::Ubuntu, "24.04", GlvndInstall::Packages),
    (DistroFamily::Debian, "10", GlvndInstall::Packages),
    (DistroFamily::Debian, "11", GlvndInstall::Packages),
    (DistroFamily::Debian, "12", GlvndInstall::Packages),
];

const PREAMBLE: &str = "\
# glvnd libraries from the NVIDIA vendor image
FROM nvidia/opengl:1.0-glvnd-devel-ubuntu@(glvnd_version) as glvnd
";

const COPY_SNIPPET: &str = "\
# NVIDIA graphics support for @(image_distro_id) @(image_distro_version)
COPY --from=glvnd /usr/local/lib/x86_64-linux-gnu /usr/local/lib/x86_64-linux-gnu
COPY --from=glvnd /usr/local/lib/i386-linux-gnu /usr/local/lib/i386-linux-gnu
COPY --from=glvnd /usr/local/share/glvnd/egl_vendor.d/10_nvidia.json /usr/local/share/glvnd/egl_vendor.d/10_nvidia.json

RUN echo '/usr/local/lib/x86_64-linux-gnu' >> /etc/ld.so.conf.d/glvnd.conf \\
 && echo '/usr/local/lib/i386-linux-gnu' >> /etc/ld.so.conf.d/glvnd.conf \\
 && ldconfig

ENV LD_LIBRARY_PATH /usr/local/lib/x86_64-linux-gnu:/usr/local/lib/i386-linux-gnu${LD_LIBRARY_PATH:+:${LD_LIBRARY_PATH}}
";

const PACKAGES_SNIPPET: &str = "\
# NVIDIA graphics support for @(image_distro_id) @(image_distro_version)
RUN apt-get update && apt-get install -y --no-install-recommends \\
    libglvnd0 \\
    libgl1 \\
    libglx0 \\
    libegl1 \\
    libgles2 \\
 && rm -rf /var/lib/apt/lists/*
COPY --from=glvnd /usr/share/glvnd/egl_vendor.d/10_nvidia.json /usr/share/glvnd/egl_vendor.d/10_nvidia.json
";

const DRIVER_ENV: &str = "
ENV NVIDIA_VISIBLE_DEVICES ${NVIDIA_VISIBLE_DEVICES:-all}
ENV NVIDIA_DRIVER_CAPABILITIES ${NVIDIA_DRIVER_CAPABILITIES:+$NVIDIA_DRIVER_CAPABILITIES,}graphics
";

/// How the GPUs are handed to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuPassthrough {
    /// Pick by engine version.
    Auto,
    /// `--gpus all`.
    Gpus,
    /// `--runtime=nvidia`.
    Runtime,
}

impl GpuPassthrough {
    fn from_args(args: &Arguments) -> Result<Self> {
        match args.text("nvidia") {
            None | Some("auto") => Ok(Self::Auto),
            Some("gpus") => Ok(Self::Gpus),
            Some("runtime") => Ok(Self::Runtime),
            Some(other) => Err(KitbashError::Config {
                message: format!("unknown nvidia mode '{other}' (expected auto, gpus or runtime)"),
            }),
        }
    }
}

/// Injects the NVIDIA graphics stack.
///
/// In `auto` mode the passthrough flag follows the engine version the
/// orchestrator records under [`keys::ENGINE_VERSION`]; without one the
/// legacy runtime flag is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvidia;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(Nvidia)
}

/// Engine version recorded in the activation arguments.
fn recorded_engine_version(args: &Arguments) -> Option<EngineVersion> {
    let text = args.text(keys::ENGINE_VERSION)?;
    match text.parse() {
        Ok(version) => Some(version),
        Err(err) => {
            tracing::warn!(%text, %err, "ignoring unparsable engine version");
            None
        }
    }
}

impl Nvidia {
    fn classify(&self, args: &Arguments) -> Result<(Release, GlvndInstall)> {
        environment::dispatch(self.name(), args, SUPPORT)
    }
}

/// Ubuntu release of the glvnd vendor image matching `release`.
fn glvnd_version(release: Release) -> &'static str {
    match (release.family, release.version) {
        (DistroFamily::Ubuntu, "24.04") => "22.04",
        (DistroFamily::Ubuntu, version) => version,
        (DistroFamily::Debian, "10") => "18.04",
        (DistroFamily::Debian, "11") => "20.04",
        (DistroFamily::Debian, _) => "22.04",
    }
}

impl Extension for Nvidia {
    fn name(&self) -> &'static str {
        "nvidia"
    }

    fn description(&self) -> &'static str {
        "Enable NVIDIA GPU graphics support (auto, gpus or runtime passthrough)"
    }

    fn arguments(&self) -> Vec<Arg> {
        vec![
            Arg::new(self.name())
                .long(self.name())
                .value_name("MODE")
                .num_args(0..=1)
                .default_missing_value("auto")
                .value_parser(PossibleValuesParser::new(["auto", "gpus", "runtime"]))
                .action(ArgAction::Set)
                .help(self.description()),
            Arg::new(GLVND_VERSION_ARG)
                .long("nvidia-glvnd-version")
                .value_name("UBUNTU_VERSION")
                .help("Ubuntu release of the glvnd vendor image, e.g. 20.04"),
        ]
    }

    fn required_extensions(&self, _args: &Arguments) -> BTreeSet<String> {
        names(["x11"])
    }

    fn environment_substitutions(&self, args: &Arguments) -> Result<Substitutions> {
        let (release, _) = self.classify(args)?;
        let glvnd = args
            .text(GLVND_VERSION_ARG)
            .unwrap_or_else(|| glvnd_version(release));
        Ok(substitutions([
            ("image_distro_id", release.family.id()),
            ("image_distro_version", release.version),
            ("image_distro_codename", release.codename),
            ("glvnd_version", glvnd),
        ]))
    }

    fn preamble(&self, args: &Arguments) -> Result<String> {
        let table = self.environment_substitutions(args)?;
        render_fragment(self.name(), PREAMBLE, &table)
    }

    fn snippet(&self, args: &Arguments) -> Result<String> {
        let (_, install) = self.classify(args)?;
        let table = self.environment_substitutions(args)?;
        let template = match install {
            GlvndInstall::Copy => COPY_SNIPPET,
            GlvndInstall::Packages => PACKAGES_SNIPPET,
        };
        let mut snippet = render_fragment(self.name(), template, &table)?;
        snippet.push_str(DRIVER_ENV);
        Ok(snippet)
    }

    fn docker_run_args(&self, args: &Arguments) -> Result<String> {
        let gpus = match GpuPassthrough::from_args(args)? {
            GpuPassthrough::Gpus => true,
            GpuPassthrough::Runtime => false,
            GpuPassthrough::Auto => {
                let version = recorded_engine_version(args);
                tracing::debug!(?version, "choosing GPU passthrough flag");
                version.is_some_and(|v| v >= GPUS_FLAG_MIN_VERSION)
            }
        };
        Ok(if gpus {
            " --gpus all".to_string()
        } else {
            " --runtime=nvidia".to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_ne;

    use super::*;

    fn base(image: &str) -> Arguments {
        Arguments::new().with("base_image", image)
    }

    #[test]
    fn xenial_copies_glvnd_libraries() {
        let snippet = Nvidia.snippet(&base("ubuntu:xenial")).expect("snippet");
        assert!(snippet.contains(
            "COPY --from=glvnd /usr/local/lib/x86_64-linux-gnu /usr/local/lib/x86_64-linux-gnu"
        ));
        assert!(snippet.contains(
            "COPY --from=glvnd /usr/local/lib/i386-linux-gnu /usr/local/lib/i386-linux-gnu"
        ));
        assert!(snippet.contains(
            "ENV LD_LIBRARY_PATH /usr/local/lib/x86_64-linux-gnu:/usr/local/lib/i386-linux-gnu"
        ));
        assert!(snippet.contains("NVIDIA_VISIBLE_DEVICES"));
        assert!(snippet.contains("NVIDIA_DRIVER_CAPABILITIES"));
    }

    #[test]
    fn bionic_installs_glvnd_packages() {
        let snippet = Nvidia.snippet(&base("ubuntu:bionic")).expect("snippet");
        assert!(snippet.contains("RUN apt-get update && apt-get install -y --no-install-recommends"));
        assert!(snippet.contains(" libglvnd0 "));
        assert!(snippet.contains(" libgles2 "));
        assert!(snippet.contains(
            "COPY --from=glvnd /usr/share/glvnd/egl_vendor.d/10_nvidia.json /usr/share/glvnd/egl_vendor.d/10_nvidia.json"
        ));
        assert!(snippet.contains("NVIDIA_VISIBLE_DEVICES"));
        assert!(snippet.contains("NVIDIA_DRIVER_CAPABILITIES"));
    }

    #[test]
    fn snippets_differ_between_release_branches() {
        let nvidia = Nvidia;
        let xenial = nvidia.snippet(&base("ubuntu:xenial")).expect("xenial");
        let jammy = nvidia.snippet(&base("ubuntu:jammy")).expect("jammy");
        assert_ne!(xenial, jammy);
    }

    #[test]
    fn preamble_names_matching_vendor_image() {
        let nvidia = Nvidia;
        let bionic = nvidia.preamble(&base("ubuntu:bionic")).expect("bionic");
        assert!(bionic.contains("FROM nvidia/opengl:1.0-glvnd-devel-ubuntu18.04"));

        let jammy = nvidia.preamble(&base("ubuntu:jammy")).expect("jammy");
        assert!(jammy.contains("FROM nvidia/opengl:1.0-glvnd-devel-ubuntu22.04"));

        let bookworm = nvidia.preamble(&base("debian:bookworm")).expect("bookworm");
        assert!(bookworm.contains("FROM nvidia/opengl:1.0-glvnd-devel-ubuntu22.04"));
    }

    #[test]
    fn glvnd_version_can_be_overridden() {
        let args = base("ubuntu:jammy").with(GLVND_VERSION_ARG, "20.04");
        let preamble = Nvidia.preamble(&args).expect("preamble");
        assert!(preamble.contains("FROM nvidia/opengl:1.0-glvnd-devel-ubuntu20.04"));
    }

    #[test]
    fn unsupported_images_exit_with_one() {
        let nvidia = Nvidia;
        for image in ["ros:does-not-exist", "ubuntu:17.04", "fedora"] {
            let err = nvidia.environment_substitutions(&base(image)).unwrap_err();
            assert!(err.is_unsupported_environment(), "{image}: {err}");
            assert_eq!(err.exit_code(), 1, "{image}");
            assert!(nvidia.snippet(&base(image)).is_err());
            assert!(nvidia.preamble(&base(image)).is_err());
        }
    }

    #[test]
    fn requires_display_forwarding() {
        let required = Nvidia.required_extensions(&Arguments::new());
        assert!(required.contains("x11"));
        assert!(!required.contains("nvidia"));
    }

    fn with_engine(args: Arguments, version: &str) -> Arguments {
        args.with(keys::ENGINE_VERSION, version)
    }

    #[test]
    fn auto_mode_follows_engine_version() {
        let args = base("ubuntu:jammy").with("nvidia", "auto");

        let modern = with_engine(args.clone(), "24.0.7");
        let legacy = with_engine(args.clone(), "18.09.0");
        assert!(Nvidia.docker_run_args(&modern).expect("modern").contains(" --gpus all"));
        assert!(Nvidia.docker_run_args(&legacy).expect("legacy").contains(" --runtime=nvidia"));
        assert!(Nvidia.docker_run_args(&args).expect("unknown").contains(" --runtime=nvidia"));

        let flag = with_engine(Arguments::new().with("nvidia", true), "19.03.5");
        assert!(Nvidia.docker_run_args(&flag).expect("flag").contains(" --gpus all"));
    }

    #[test]
    fn unparsable_engine_version_falls_back_to_runtime() {
        let args = with_engine(Arguments::new().with("nvidia", "auto"), "unknown");
        assert_eq!(Nvidia.docker_run_args(&args).expect("run args"), " --runtime=nvidia");
    }

    #[test]
    fn explicit_modes_ignore_engine_version() {
        let gpus = with_engine(Arguments::new().with("nvidia", "gpus"), "18.09.0");
        assert!(Nvidia.docker_run_args(&gpus).expect("gpus").contains(" --gpus all"));

        let runtime = with_engine(Arguments::new().with("nvidia", "runtime"), "24.0.0");
        assert!(Nvidia.docker_run_args(&runtime).expect("runtime").contains(" --runtime=nvidia"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let args = Arguments::new().with("nvidia", "cuda");
        assert!(Nvidia.docker_run_args(&args).is_err());
    }
}
