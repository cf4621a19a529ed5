//! # kitbash-template
//!
//! Expands fragment markup into final Dockerfile text.
//!
//! Placeholders are written `@(name)` and are looked up in a
//! [`Substitutions`] table; `@@` produces a literal `@`. Rendering is a
//! single pass, so substituted values are never scanned for further
//! placeholders, and every call is independent of every other.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use kitbash_common::error::KitbashError;
use regex::{Captures, Regex};
use thiserror::Error;

/// Placeholder name to replacement text.
pub type Substitutions = BTreeMap<String, String>;

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@@|@\(([A-Za-z_][A-Za-z0-9_]*)\)").expect("placeholder pattern is valid")
});

/// Errors produced while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The source used placeholders missing from the table.
    #[error("unresolved placeholders: {}", names.iter().cloned().collect::<Vec<_>>().join(", "))]
    Unresolved {
        /// Every missing placeholder name.
        names: BTreeSet<String>,
    },
}

impl From<RenderError> for KitbashError {
    fn from(err: RenderError) -> Self {
        Self::Template {
            message: err.to_string(),
        }
    }
}

/// Renders `source`, replacing each `@(name)` with `table[name]`.
///
/// # Errors
///
/// Returns [`RenderError::Unresolved`] naming every placeholder that is
/// not in `table`. Nothing is rendered partially.
pub fn render(source: &str, table: &Substitutions) -> Result<String, RenderError> {
    let missing: BTreeSet<String> = placeholders(source)
        .into_iter()
        .filter(|name| !table.contains_key(name))
        .collect();
    if !missing.is_empty() {
        tracing::debug!(?missing, "template has unresolved placeholders");
        return Err(RenderError::Unresolved { names: missing });
    }

    let rendered = PLACEHOLDER.replace_all(source, |caps: &Captures<'_>| {
        caps.get(1)
            .and_then(|name| table.get(name.as_str()))
            .map_or_else(|| "@".to_string(), Clone::clone)
    });
    Ok(rendered.into_owned())
}

/// Returns the set of placeholder names used in `source`.
#[must_use]
pub fn placeholders(source: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Builds a table from string pairs.
#[must_use]
pub fn substitutions<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Substitutions
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
