//! CLI definition and dispatch.
//!
//! The core options are declared here; every registered extension adds
//! its own arguments when the command is built.

pub mod activate;
pub mod list;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, CommandFactory, Parser};
use kitbash_common::config::KitbashConfig;
use kitbash_common::constants::{BIN_NAME, keys};
use kitbash_common::types::{ArgValue, Arguments, RunMode};
use kitbash_extension::ExtensionRegistry;

/// kitbash: compose container images from reusable extensions.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Base image the extensions are layered onto.
    #[arg(required_unless_present = "list_extensions")]
    pub base_image: Option<String>,

    /// Command run inside the container.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// How to launch the container: interactive, non-interactive or dry-run.
    #[arg(long)]
    pub mode: Option<RunMode>,

    /// Build without the layer cache.
    #[arg(long)]
    pub nocache: bool,

    /// Pull a newer base image while building.
    #[arg(long)]
    pub pull: bool,

    /// Network used during the build only.
    #[arg(long, value_name = "NETWORK")]
    pub build_network: Option<String>,

    /// Tag for the built image instead of the generated one.
    #[arg(long, value_name = "TAG")]
    pub image_name: Option<String>,

    /// Keep host-side files extensions create.
    #[arg(long)]
    pub nocleanup: bool,

    /// Build the image without running it.
    #[arg(long)]
    pub noexecute: bool,

    /// Remove the image once done.
    #[arg(long)]
    pub clear_image: bool,

    /// Print the composed Dockerfile and exit.
    #[arg(long)]
    pub print_dockerfile: bool,

    /// List available extensions and exit.
    #[arg(long)]
    pub list_extensions: bool,

    /// Extensions that may not be activated, in addition to the configured ones.
    #[arg(long, value_name = "NAME", value_delimiter = ',')]
    pub extension_blocklist: Vec<String>,

    /// Log progress at info level.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Builds the command line with every extension's arguments.
pub fn command(registry: &ExtensionRegistry) -> clap::Command {
    let extension_args: Vec<Arg> = registry
        .instantiate_all()
        .iter()
        .flat_map(|extension| extension.arguments())
        .collect();
    Cli::command()
        .next_help_heading("Extensions")
        .args(extension_args)
}

/// Collects the activation arguments from the parsed command line.
pub fn activation_arguments(
    cli: &Cli,
    matches: &ArgMatches,
    registry: &ExtensionRegistry,
) -> Arguments {
    let mut args = Arguments::new();
    if let Some(base) = &cli.base_image {
        args.insert(keys::BASE_IMAGE, base.as_str());
    }
    if !cli.command.is_empty() {
        args.insert(keys::COMMAND, cli.command.clone());
    }
    if let Some(mode) = cli.mode {
        args.insert(keys::MODE, mode.to_string());
    }
    if let Some(network) = &cli.build_network {
        args.insert(keys::BUILD_NETWORK, network.as_str());
    }
    if let Some(name) = &cli.image_name {
        args.insert(keys::IMAGE_NAME, name.as_str());
    }
    args.insert(keys::NOCACHE, cli.nocache);
    args.insert(keys::PULL, cli.pull);
    args.insert(keys::NOCLEANUP, cli.nocleanup);

    for extension in registry.instantiate_all() {
        for arg in extension.arguments() {
            if let Some(value) = given_value(matches, &arg) {
                args.insert(arg.get_id().as_str(), value);
            }
        }
    }
    args
}

/// Value of an extension argument given on the command line.
fn given_value(matches: &ArgMatches, arg: &Arg) -> Option<ArgValue> {
    let id = arg.get_id().as_str();
    if matches.value_source(id) != Some(ValueSource::CommandLine) {
        return None;
    }
    match arg.get_action() {
        ArgAction::SetTrue => Some(ArgValue::Flag(matches.get_flag(id))),
        ArgAction::Append => matches
            .get_many::<String>(id)
            .map(|values| ArgValue::List(values.cloned().collect())),
        _ => matches
            .get_one::<String>(id)
            .map(|value| ArgValue::Text(value.clone())),
    }
}

/// Extensions blocked by the configuration or the command line.
pub fn blocklist(cli: &Cli, config: &KitbashConfig) -> Vec<String> {
    let mut blocked: Vec<String> = config
        .extension_blocklist
        .iter()
        .chain(&cli.extension_blocklist)
        .cloned()
        .collect();
    blocked.sort();
    blocked.dedup();
    blocked
}

#[cfg(test)]
mod tests {
    use clap::FromArgMatches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(argv: &[&str]) -> (Cli, Arguments) {
        let registry = ExtensionRegistry::builtin();
        let matches = command(&registry)
            .try_get_matches_from(argv)
            .expect("parse");
        let cli = Cli::from_arg_matches(&matches).expect("cli");
        let args = activation_arguments(&cli, &matches, &registry);
        (cli, args)
    }

    #[test]
    fn command_is_consistent() {
        command(&ExtensionRegistry::builtin()).debug_assert();
    }

    #[test]
    fn core_options_become_arguments() {
        let (cli, args) = parse(&[
            "kitbash",
            "--nocache",
            "--mode",
            "dry-run",
            "--image-name",
            "dev:latest",
            "ubuntu:jammy",
            "glxgears",
            "-info",
        ]);
        assert_eq!(cli.mode, Some(RunMode::DryRun));
        assert_eq!(args.base_image(), Some("ubuntu:jammy"));
        assert_eq!(args.list(keys::COMMAND), vec!["glxgears", "-info"]);
        assert_eq!(args.text(keys::IMAGE_NAME), Some("dev:latest"));
        assert!(args.flag(keys::NOCACHE));
        assert!(!args.flag(keys::PULL));
    }

    #[test]
    fn extension_switches_request_extensions() {
        let (_, args) = parse(&["kitbash", "--x11", "--user", "ubuntu:jammy"]);
        assert!(args.is_requested("x11"));
        assert!(args.is_requested("user"));
        assert!(!args.contains("nvidia"));
        assert!(!args.contains("user_preserve_home"));
    }

    #[test]
    fn repeated_extension_options_are_lists() {
        let (_, args) = parse(&[
            "kitbash",
            "--env",
            "A=1",
            "--env",
            "B=2",
            "--network",
            "host",
            "debian:bookworm",
        ]);
        assert_eq!(args.list("env"), vec!["A=1", "B=2"]);
        assert_eq!(args.text("network"), Some("host"));
    }

    #[test]
    fn nvidia_mode_defaults_to_auto() {
        let (_, args) = parse(&["kitbash", "--nvidia", "--", "ubuntu:jammy"]);
        assert_eq!(args.text("nvidia"), Some("auto"));

        let (_, args) = parse(&["kitbash", "--nvidia", "gpus", "ubuntu:jammy"]);
        assert_eq!(args.text("nvidia"), Some("gpus"));
    }

    #[test]
    fn list_extensions_needs_no_base_image() {
        let (cli, _) = parse(&["kitbash", "--list-extensions"]);
        assert!(cli.list_extensions);
        assert!(cli.base_image.is_none());
    }

    #[test]
    fn blocklists_are_merged() {
        let (cli, _) = parse(&[
            "kitbash",
            "--extension-blocklist",
            "privileged,devices",
            "ubuntu:jammy",
        ]);
        let config = KitbashConfig {
            extension_blocklist: vec!["privileged".into(), "home".into()],
            ..KitbashConfig::default()
        };
        assert_eq!(blocklist(&cli, &config), vec!["devices", "home", "privileged"]);
    }
}
