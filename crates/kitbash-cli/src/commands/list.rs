//! `kitbash --list-extensions`: show the registered extensions.

use std::io::Write;

use kitbash_extension::ExtensionRegistry;

use crate::output::{ExtensionRow, extension_table};

/// Writes the extension listing to standard output.
///
/// # Errors
///
/// Returns an error if standard output cannot be written.
pub fn execute(registry: &ExtensionRegistry, blocked: &[String]) -> anyhow::Result<()> {
    let extensions = registry.instantiate_all();
    let rows: Vec<ExtensionRow<'_>> = extensions
        .iter()
        .map(|extension| ExtensionRow {
            name: extension.name(),
            description: extension.description(),
            blocked: blocked.iter().any(|b| b == extension.name()),
        })
        .collect();

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Available extensions:")?;
    write!(stdout, "{}", extension_table(&rows))?;
    Ok(())
}
