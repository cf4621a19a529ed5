//! Base image classification.
//!
//! Extensions with OS-specific output all follow the same shape: parse the
//! base image reference into a distro family and release, look the pair up
//! in a small per-extension table, and fail with
//! [`KitbashError::UnsupportedEnvironment`] on a miss. There is no
//! fallback row.

use std::fmt;

use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::{Arguments, ImageReference};

/// Distribution families kitbash can classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DistroFamily {
    /// Ubuntu (`ubuntu:<codename|YY.MM>`).
    Ubuntu,
    /// Debian (`debian:<codename|major>`).
    Debian,
}

impl DistroFamily {
    /// Lowercase identifier, as used in image names.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Ubuntu => "ubuntu",
            Self::Debian => "debian",
        }
    }

    fn from_image_name(name: &str) -> Option<Self> {
        match name {
            "ubuntu" => Some(Self::Ubuntu),
            "debian" => Some(Self::Debian),
            _ => None,
        }
    }

    const fn releases(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Ubuntu => UBUNTU_RELEASES,
            Self::Debian => DEBIAN_RELEASES,
        }
    }
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Known ubuntu releases, `(version, codename)`.
const UBUNTU_RELEASES: &[(&str, &str)] = &[
    ("14.04", "trusty"),
    ("16.04", "xenial"),
    ("16.10", "yakkety"),
    ("17.04", "zesty"),
    ("17.10", "artful"),
    ("18.04", "bionic"),
    ("18.10", "cosmic"),
    ("19.04", "disco"),
    ("19.10", "eoan"),
    ("20.04", "focal"),
    ("20.10", "groovy"),
    ("21.04", "hirsute"),
    ("21.10", "impish"),
    ("22.04", "jammy"),
    ("22.10", "kinetic"),
    ("23.04", "lunar"),
    ("23.10", "mantic"),
    ("24.04", "noble"),
    ("24.10", "oracular"),
    ("25.04", "plucky"),
];

/// Known debian releases, `(major version, codename)`.
const DEBIAN_RELEASES: &[(&str, &str)] = &[
    ("8", "jessie"),
    ("9", "stretch"),
    ("10", "buster"),
    ("11", "bullseye"),
    ("12", "bookworm"),
    ("13", "trixie"),
];

/// A classified base image release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Release {
    /// Distribution family.
    pub family: DistroFamily,
    /// Numeric version (`22.04`, `12`).
    pub version: &'static str,
    /// Release codename (`jammy`, `bookworm`).
    pub codename: &'static str,
}

/// Classifies an image reference into a known release.
///
/// Tags may name the codename or the version; variant suffixes such as
/// `-slim` and debian point releases (`12.5`) are folded away.
///
/// # Errors
///
/// Returns a description of the failure when the image is not an official
/// ubuntu or debian image, or its tag names no known release.
pub fn classify(reference: &ImageReference) -> std::result::Result<Release, String> {
    let family = reference
        .official_name()
        .and_then(DistroFamily::from_image_name)
        .ok_or_else(|| format!("unrecognized distribution '{}'", reference.repository))?;

    let tag = reference
        .tag
        .as_deref()
        .ok_or_else(|| format!("{family} image has no release tag"))?;
    let token = normalize_tag(family, tag);

    family
        .releases()
        .iter()
        .find(|(version, codename)| *version == token || *codename == token)
        .map(|&(version, codename)| Release {
            family,
            version,
            codename,
        })
        .ok_or_else(|| format!("unrecognized {family} release '{tag}'"))
}

fn normalize_tag(family: DistroFamily, tag: &str) -> String {
    let tag = tag.to_ascii_lowercase();
    let base = tag.split('-').next().unwrap_or_default();
    let keep = match family {
        DistroFamily::Ubuntu => 2,
        DistroFamily::Debian => 1,
    };
    if base.starts_with(|c: char| c.is_ascii_digit()) {
        base.split('.').take(keep).collect::<Vec<_>>().join(".")
    } else {
        base.to_string()
    }
}

/// One row of an extension's dispatch table.
pub type SupportRow<V> = (DistroFamily, &'static str, V);

/// Classifies the base image in `args` and selects the matching row of
/// `table`.
///
/// # Errors
///
/// Returns [`KitbashError::Config`] if no base image is set, and
/// [`KitbashError::UnsupportedEnvironment`] if the image cannot be
/// classified or its release has no row in `table`.
pub fn dispatch<V: Copy>(
    extension: &str,
    args: &Arguments,
    table: &[SupportRow<V>],
) -> Result<(Release, V)> {
    let image = args.base_image().ok_or_else(|| KitbashError::Config {
        message: format!("extension '{extension}' needs a base image"),
    })?;
    let unsupported = |reason: String| KitbashError::UnsupportedEnvironment {
        extension: extension.to_string(),
        image: image.to_string(),
        reason,
    };

    let reference = ImageReference::parse(image)?;
    let release = classify(&reference).map_err(unsupported)?;

    let variant = table
        .iter()
        .find(|(family, version, _)| *family == release.family && *version == release.version)
        .map(|&(_, _, variant)| variant)
        .ok_or_else(|| {
            let supported: Vec<String> = table
                .iter()
                .filter(|(family, _, _)| *family == release.family)
                .map(|(_, version, _)| (*version).to_string())
                .collect();
            let reason = if supported.is_empty() {
                format!("{} is not supported", release.family)
            } else {
                format!(
                    "{} {} is not supported (supported: {})",
                    release.family,
                    release.version,
                    supported.join(", ")
                )
            };
            unsupported(reason)
        })?;

    tracing::debug!(
        extension,
        family = %release.family,
        version = release.version,
        "classified base image"
    );
    Ok((release, variant))
}
