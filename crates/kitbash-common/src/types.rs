//! Domain primitive types used across the kitbash workspace.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::keys;
use crate::error::{KitbashError, Result};

/// Registry prefix the engine implies for unqualified references.
const DEFAULT_REGISTRY: &str = "docker.io/";

/// Namespace of official images on the default registry.
const OFFICIAL_NAMESPACE: &str = "library/";

/// Parsed `repository[:tag][@digest]` image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    /// Repository path, including any registry host.
    pub repository: String,
    /// Tag, when one was given.
    pub tag: Option<String>,
    /// Content digest, when one was given.
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parses an image reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference or its repository is empty.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(KitbashError::Config {
                message: "empty image reference".into(),
            });
        }

        let (name_tag, digest) = match reference.split_once('@') {
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (reference, None),
        };

        // A colon before the last slash belongs to a registry port.
        let last_slash = name_tag.rfind('/').unwrap_or(0);
        let (repository, tag) = match name_tag.rfind(':') {
            Some(colon) if colon > last_slash => (
                &name_tag[..colon],
                Some(name_tag[colon + 1..].to_string()),
            ),
            _ => (name_tag, None),
        };

        if repository.is_empty() {
            return Err(KitbashError::Config {
                message: format!("image reference has no repository: {reference}"),
            });
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.filter(|t| !t.is_empty()),
            digest,
        })
    }

    /// Returns the bare name of an official image (`ubuntu` for
    /// `docker.io/library/ubuntu`), or `None` for namespaced repositories.
    #[must_use]
    pub fn official_name(&self) -> Option<&str> {
        let name = self
            .repository
            .strip_prefix(DEFAULT_REGISTRY)
            .unwrap_or(&self.repository);
        let name = name.strip_prefix(OFFICIAL_NAMESPACE).unwrap_or(name);
        if name.contains('/') { None } else { Some(name) }
    }

    /// Returns the reference folded into characters valid in a
    /// repository name component.
    #[must_use]
    pub fn sanitized(&self) -> String {
        let mut out = String::new();
        let raw = match &self.tag {
            Some(tag) => format!("{}_{tag}", self.repository),
            None => self.repository.clone(),
        };
        for c in raw.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if !out.ends_with('_') {
                out.push('_');
            }
        }
        out.trim_matches('_').to_string()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

/// A single activation argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// A switch.
    Flag(bool),
    /// A single value.
    Text(String),
    /// A repeated option.
    List(Vec<String>),
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for ArgValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Free-form activation arguments: CLI flags and extension options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(BTreeMap<String, ArgValue>);

impl Arguments {
    /// Creates an empty argument map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces an argument.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        let _ = self.0.insert(key.into(), value.into());
    }

    /// Returns the raw value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    /// Returns whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns a single text value.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ArgValue::Text(value)) => Some(value),
            Some(ArgValue::List(values)) => values.last().map(String::as_str),
            _ => None,
        }
    }

    /// Returns a switch value; absent keys are `false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(ArgValue::Flag(value)) => *value,
            Some(ArgValue::Text(_)) => true,
            Some(ArgValue::List(values)) => !values.is_empty(),
            None => false,
        }
    }

    /// Returns every value of a repeated option.
    #[must_use]
    pub fn list(&self, key: &str) -> Vec<&str> {
        match self.0.get(key) {
            Some(ArgValue::List(values)) => values.iter().map(String::as_str).collect(),
            Some(ArgValue::Text(value)) => vec![value.as_str()],
            _ => Vec::new(),
        }
    }

    /// Returns whether the extension or option `name` was requested.
    ///
    /// Any present value other than `false` counts as a request.
    #[must_use]
    pub fn is_requested(&self, name: &str) -> bool {
        self.flag(name)
    }

    /// Returns the base image reference, if set.
    #[must_use]
    pub fn base_image(&self) -> Option<&str> {
        self.text(keys::BASE_IMAGE)
    }

    /// Iterates over all arguments in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, ArgValue>> for Arguments {
    fn from(map: BTreeMap<String, ArgValue>) -> Self {
        Self(map)
    }
}

/// Version of the container engine, `major.minor[.patch]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EngineVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version, zero when absent.
    pub patch: u32,
}

impl EngineVersion {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for EngineVersion {
    type Err = KitbashError;

    /// Parses engine version strings such as `19.03.5`, `24.0.7` or
    /// `20.10.21+dfsg1`. Anything after the numeric prefix of each
    /// component is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || KitbashError::Config {
            message: format!("invalid engine version: {s}"),
        };
        let core = s.trim().trim_start_matches('v');
        let mut parts = core.splitn(3, '.').map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        });

        let major = parts.next().flatten().ok_or_else(invalid)?;
        let minor = parts.next().flatten().ok_or_else(invalid)?;
        let patch = parts.next().flatten().unwrap_or(0);
        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}.{}", self.major, self.minor, self.patch)
    }
}

/// How the built container is launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Attach a TTY and stdin (`-it`).
    #[default]
    Interactive,
    /// Run without a TTY.
    NonInteractive,
    /// Print what would run without starting a container.
    DryRun,
}

impl RunMode {
    /// Returns the mode requested in `args`, or `fallback`.
    ///
    /// # Errors
    ///
    /// Returns an error if the `mode` argument holds an unknown value.
    pub fn from_args(args: &Arguments, fallback: Self) -> Result<Self> {
        args.text(keys::MODE).map_or(Ok(fallback), str::parse)
    }
}

impl FromStr for RunMode {
    type Err = KitbashError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "interactive" => Ok(Self::Interactive),
            "non-interactive" => Ok(Self::NonInteractive),
            "dry-run" => Ok(Self::DryRun),
            other => Err(KitbashError::Config {
                message: format!(
                    "unknown run mode '{other}' (expected interactive, non-interactive or dry-run)"
                ),
            }),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interactive => write!(f, "interactive"),
            Self::NonInteractive => write!(f, "non-interactive"),
            Self::DryRun => write!(f, "dry-run"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reference_with_tag() {
        let r = ImageReference::parse("ubuntu:jammy").expect("parse");
        assert_eq!(r.repository, "ubuntu");
        assert_eq!(r.tag.as_deref(), Some("jammy"));
        assert_eq!(r.official_name(), Some("ubuntu"));
    }

    #[test]
    fn parse_reference_without_tag() {
        let r = ImageReference::parse("fedora").expect("parse");
        assert_eq!(r.repository, "fedora");
        assert!(r.tag.is_none());
    }

    #[test]
    fn parse_reference_with_registry_port() {
        let r = ImageReference::parse("localhost:5000/team/app").expect("parse");
        assert_eq!(r.repository, "localhost:5000/team/app");
        assert!(r.tag.is_none());
        assert_eq!(r.official_name(), None);
    }

    #[test]
    fn parse_reference_with_digest() {
        let r = ImageReference::parse("debian:12@sha256:abc").expect("parse");
        assert_eq!(r.tag.as_deref(), Some("12"));
        assert_eq!(r.digest.as_deref(), Some("sha256:abc"));
        assert_eq!(r.to_string(), "debian:12@sha256:abc");
    }

    #[test]
    fn official_name_strips_default_registry() {
        let r = ImageReference::parse("docker.io/library/debian:bookworm").expect("parse");
        assert_eq!(r.official_name(), Some("debian"));
    }

    #[test]
    fn parse_empty_reference_fails() {
        assert!(ImageReference::parse("  ").is_err());
        assert!(ImageReference::parse(":tag").is_err());
    }

    #[test]
    fn sanitized_collapses_separators() {
        let r = ImageReference::parse("nvidia/opengl:1.0-glvnd").expect("parse");
        assert_eq!(r.sanitized(), "nvidia_opengl_1_0_glvnd");
    }

    #[test]
    fn arguments_accessors() {
        let args = Arguments::new()
            .with("base_image", "ubuntu:jammy")
            .with("x11", true)
            .with("privileged", false)
            .with("env", vec!["A=1".to_string(), "B=2".to_string()]);
        assert_eq!(args.base_image(), Some("ubuntu:jammy"));
        assert!(args.is_requested("x11"));
        assert!(!args.is_requested("privileged"));
        assert!(!args.is_requested("nvidia"));
        assert_eq!(args.list("env"), vec!["A=1", "B=2"]);
        assert!(args.list("volume").is_empty());
    }

    #[test]
    fn text_option_counts_as_requested() {
        let args = Arguments::new().with("nvidia", "gpus");
        assert!(args.is_requested("nvidia"));
        assert_eq!(args.text("nvidia"), Some("gpus"));
    }

    #[test]
    fn engine_version_parses_docker_formats() {
        assert_eq!(
            "19.03.5".parse::<EngineVersion>().expect("parse"),
            EngineVersion::new(19, 3, 5)
        );
        assert_eq!(
            "20.10.21+dfsg1".parse::<EngineVersion>().expect("parse"),
            EngineVersion::new(20, 10, 21)
        );
        assert_eq!(
            "24.0".parse::<EngineVersion>().expect("parse"),
            EngineVersion::new(24, 0, 0)
        );
        assert!("unknown".parse::<EngineVersion>().is_err());
    }

    #[test]
    fn engine_version_orders_numerically() {
        let legacy = EngineVersion::new(18, 9, 7);
        let threshold = EngineVersion::new(19, 3, 0);
        assert!(legacy < threshold);
        assert!(EngineVersion::new(24, 0, 0) > threshold);
    }

    #[test]
    fn run_mode_from_args() {
        let args = Arguments::new().with("mode", "dry-run");
        assert_eq!(
            RunMode::from_args(&args, RunMode::Interactive).expect("mode"),
            RunMode::DryRun
        );
        assert_eq!(
            RunMode::from_args(&Arguments::new(), RunMode::NonInteractive).expect("mode"),
            RunMode::NonInteractive
        );
        let bad = Arguments::new().with("mode", "detached");
        assert!(RunMode::from_args(&bad, RunMode::Interactive).is_err());
    }
}
