//! Formatted output helpers for CLI commands.

/// One row of the extension listing.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionRow<'a> {
    /// Extension name.
    pub name: &'a str,
    /// One-line description.
    pub description: &'a str,
    /// Whether the blocklist excludes the extension.
    pub blocked: bool,
}

/// Formats extensions as an aligned two-column table.
#[must_use]
pub fn extension_table(rows: &[ExtensionRow<'_>]) -> String {
    let width = rows.iter().map(|row| row.name.len()).max().unwrap_or(0);
    rows.iter()
        .map(|row| {
            let marker = if row.blocked { " (blocked)" } else { "" };
            format!("  {:<width$}  {}{marker}\n", row.name, row.description)
        })
        .collect()
}
