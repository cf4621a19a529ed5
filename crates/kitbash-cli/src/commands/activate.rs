//! The default action: build the activation's image, then run it.

use std::io::Write;

use kitbash_common::config::KitbashConfig;
use kitbash_common::types::Arguments;
use kitbash_compose::requested_names;
use kitbash_engine::{DockerCli, ImageGenerator};
use kitbash_extension::ExtensionRegistry;

use super::Cli;

/// Builds and runs the image, returning the process exit status.
///
/// The status is the build's when the build fails or `--noexecute` is
/// given, the container's otherwise.
///
/// # Errors
///
/// Returns an error if the activation cannot be resolved, a precondition
/// fails, the base image is unsupported, or the engine cannot be driven.
/// A container engine binary that cannot be found is reported before
/// anything is built.
pub fn execute(
    cli: &Cli,
    args: Arguments,
    registry: &ExtensionRegistry,
    blocked: &[String],
    config: &KitbashConfig,
) -> anyhow::Result<i32> {
    let mut requested = requested_names(registry, &args);
    requested.retain(|name| {
        let allowed = !blocked.iter().any(|b| b.as_str() == *name);
        if !allowed {
            tracing::warn!(extension = *name, "extension is blocklisted, ignoring");
        }
        allowed
    });
    let active = registry.clone().without(blocked);

    let generator = ImageGenerator::new(&requested, &active, args, config)?;

    if cli.print_dockerfile {
        let dockerfile = generator.dockerfile()?;
        write!(std::io::stdout().lock(), "{dockerfile}")?;
        return Ok(0);
    }

    let engine = DockerCli::locate(&config.docker_binary)?;
    tracing::info!(binary = %engine.binary().display(), "using container engine");
    let mut generator = generator.with_engine(Box::new(engine));

    let outcome = build_and_run(cli, &mut generator);
    let cleaned = generator.cleanup();
    let status = outcome?;
    cleaned?;

    if cli.clear_image {
        generator.clear_image()?;
    }
    Ok(status)
}

fn build_and_run(cli: &Cli, generator: &mut ImageGenerator) -> anyhow::Result<i32> {
    let built = generator.build()?;
    if built != 0 {
        tracing::error!(status = built, "build failed, not running the container");
        return Ok(built);
    }
    if cli.noexecute {
        tracing::info!(tag = generator.image_tag(), "image built, not running");
        return Ok(0);
    }
    Ok(generator.run()?)
}
