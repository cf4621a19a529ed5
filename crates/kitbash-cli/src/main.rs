//! # kitbash
//!
//! Composes a container image from a base image and a set of extensions,
//! builds it, and runs it.

mod commands;
mod output;

use clap::FromArgMatches;
use kitbash_common::config::KitbashConfig;
use kitbash_common::constants::BIN_NAME;
use kitbash_common::error::KitbashError;
use kitbash_extension::ExtensionRegistry;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            e.downcast_ref::<KitbashError>()
                .map_or(1, KitbashError::exit_code)
        }
    };
    std::process::exit(code);
}

#[allow(clippy::print_stderr)]
fn report(error: &anyhow::Error) {
    eprintln!("{BIN_NAME}: {error:#}");
}

fn run() -> anyhow::Result<i32> {
    let registry = ExtensionRegistry::builtin();
    let matches = commands::command(&registry).get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    init_logging(cli.verbose);

    let config = KitbashConfig::load()?;
    let blocked = commands::blocklist(&cli, &config);

    if cli.list_extensions {
        commands::list::execute(&registry, &blocked)?;
        return Ok(0);
    }

    let args = commands::activation_arguments(&cli, &matches, &registry);
    commands::activate::execute(&cli, args, &registry, &blocked, &config)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}
