//! Build file composition.
//!
//! A composed Dockerfile is every preamble in activation order, the base
//! image directive, then every snippet in activation order. Fragments are
//! never interleaved.

use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::Arguments;
use kitbash_extension::Extension;
use kitbash_template::substitutions;

/// Layout of the rendered document.
const DOCUMENT: &str = "@(preambles)FROM @(base_image)\n\n@(snippets)";

/// A build fragment contributed by one extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Contributing extension.
    pub extension: &'static str,
    /// Dockerfile text.
    pub text: String,
}

impl Fragment {
    fn render(&self, kind: &str) -> String {
        format!(
            "# {kind} from extension [{}]\n{}\n\n",
            self.extension,
            self.text.trim_end()
        )
    }
}

/// The composed build specification of one activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedBuildSpec {
    /// Base image reference as given.
    pub base_image: String,
    /// Non-empty preambles in activation order.
    pub preambles: Vec<Fragment>,
    /// Non-empty snippets in activation order.
    pub snippets: Vec<Fragment>,
}

impl ComposedBuildSpec {
    /// Renders the buildable Dockerfile text.
    ///
    /// # Errors
    ///
    /// Returns [`KitbashError::Template`] if the document layout cannot be
    /// rendered.
    pub fn render(&self) -> Result<String> {
        let preambles: String = self.preambles.iter().map(|f| f.render("Preamble")).collect();
        let snippets: String = self.snippets.iter().map(|f| f.render("Snippet")).collect();
        let table = substitutions([
            ("preambles", preambles),
            ("base_image", self.base_image.clone()),
            ("snippets", snippets),
        ]);
        let rendered = kitbash_template::render(DOCUMENT, &table).map_err(|e| KitbashError::Template {
            message: format!("build document: {e}"),
        })?;
        Ok(format!("{}\n", rendered.trim_end()))
    }
}

/// Composes the build specification of `extensions` in the given order.
///
/// Every extension's environment table is computed first, so an
/// unsupported base image stops composition before any fragment is used.
///
/// # Errors
///
/// Returns [`KitbashError::Config`] if no base image is set, and the first
/// error any extension reports.
pub fn compose(extensions: &[Box<dyn Extension>], args: &Arguments) -> Result<ComposedBuildSpec> {
    let base_image = args
        .base_image()
        .ok_or_else(|| KitbashError::Config {
            message: "no base image given".into(),
        })?
        .to_string();

    check_environments(extensions, args)?;

    let mut preambles = Vec::new();
    let mut snippets = Vec::new();
    for extension in extensions {
        let preamble = extension.preamble(args)?;
        if !preamble.trim().is_empty() {
            preambles.push(Fragment {
                extension: extension.name(),
                text: preamble,
            });
        }
        let snippet = extension.snippet(args)?;
        if !snippet.trim().is_empty() {
            snippets.push(Fragment {
                extension: extension.name(),
                text: snippet,
            });
        }
    }

    Ok(ComposedBuildSpec {
        base_image,
        preambles,
        snippets,
    })
}

/// Concatenates the container launch arguments of `extensions` in order.
///
/// # Errors
///
/// Returns the first error any extension reports.
/// Asks every extension to classify the base image before any fragment is
/// rendered, so an unsupported image fails the whole composition up front.
/// The tables are discarded; extensions rebuild them while rendering.
fn check_environments(extensions: &[Box<dyn Extension>], args: &Arguments) -> Result<()> {
    for extension in extensions {
        let table = extension.environment_substitutions(args)?;
        tracing::debug!(extension = extension.name(), entries = table.len(), "environment accepted");
    }
    Ok(())
}

pub fn collect_run_args(extensions: &[Box<dyn Extension>], args: &Arguments) -> Result<String> {
    let mut run_args = String::new();
    for extension in extensions {
        run_args.push_str(&extension.docker_run_args(args)?);
    }
    Ok(run_args)
}

#[cfg(test)]
mod tests {
    use kitbash_template::Substitutions;
    use pretty_assertions::assert_eq;

    use super::*;

    struct Stage {
        name: &'static str,
        preamble: &'static str,
        snippet: &'static str,
        run_args: &'static str,
    }

    impl Extension for Stage {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "test fixture"
        }

        fn preamble(&self, _args: &Arguments) -> Result<String> {
            Ok(self.preamble.to_string())
        }

        fn snippet(&self, _args: &Arguments) -> Result<String> {
            Ok(self.snippet.to_string())
        }

        fn docker_run_args(&self, _args: &Arguments) -> Result<String> {
            Ok(self.run_args.to_string())
        }
    }

    fn stages() -> Vec<Box<dyn Extension>> {
        vec![
            Box::new(Stage {
                name: "first",
                preamble: "FROM alpine as first\n",
                snippet: "RUN echo first\n",
                run_args: " -e FIRST=1",
            }),
            Box::new(Stage {
                name: "quiet",
                preamble: "",
                snippet: "  \n",
                run_args: "",
            }),
            Box::new(Stage {
                name: "second",
                preamble: "FROM busybox as second",
                snippet: "RUN echo '@(base_image)'",
                run_args: " -v /a:/b",
            }),
        ]
    }

    /// Rejects every base image; its fragments must never be asked for.
    struct Picky;

    impl Extension for Picky {
        fn name(&self) -> &'static str {
            "picky"
        }

        fn description(&self) -> &'static str {
            "test fixture"
        }

        fn environment_substitutions(&self, args: &Arguments) -> Result<Substitutions> {
            Err(KitbashError::UnsupportedEnvironment {
                extension: self.name().into(),
                image: args.base_image().unwrap_or_default().into(),
                reason: "never supported".into(),
            })
        }

        fn preamble(&self, _args: &Arguments) -> Result<String> {
            Err(KitbashError::Template {
                message: "preamble rendered".into(),
            })
        }
    }

    fn base() -> Arguments {
        Arguments::new().with("base_image", "ubuntu:jammy")
    }

    #[test]
    fn layout_keeps_sections_apart() {
        let spec = compose(&stages(), &base()).expect("compose");
        let expected = "\
# Preamble from extension [first]
FROM alpine as first

# Preamble from extension [second]
FROM busybox as second

FROM ubuntu:jammy

# Snippet from extension [first]
RUN echo first

# Snippet from extension [second]
RUN echo '@(base_image)'
";
        assert_eq!(spec.render().expect("render"), expected);
    }

    #[test]
    fn empty_fragments_are_skipped() {
        let spec = compose(&stages(), &base()).expect("compose");
        let names: Vec<_> = spec.snippets.iter().map(|f| f.extension).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn no_extensions_is_just_the_base() {
        let spec = compose(&[], &base()).expect("compose");
        assert_eq!(spec.render().expect("render"), "FROM ubuntu:jammy\n");
    }

    #[test]
    fn missing_base_image_is_a_config_error() {
        let err = compose(&stages(), &Arguments::new()).unwrap_err();
        assert!(matches!(err, KitbashError::Config { .. }));
    }

    #[test]
    fn run_args_preserve_order() {
        assert_eq!(
            collect_run_args(&stages(), &base()).expect("args"),
            " -e FIRST=1 -v /a:/b"
        );
    }

    #[test]
    fn environments_are_checked_before_any_fragment() {
        let mut extensions = stages();
        extensions.push(Box::new(Picky));
        let err = compose(&extensions, &base()).unwrap_err();
        assert!(err.is_unsupported_environment(), "{err}");
    }

    #[test]
    fn unsupported_base_stops_composition() {
        let registry = kitbash_extension::ExtensionRegistry::builtin();
        let nvidia = vec![registry.instantiate("nvidia").expect("nvidia")];
        let args = Arguments::new().with("base_image", "ubuntu:17.04");
        let err = compose(&nvidia, &args).unwrap_err();
        assert!(err.is_unsupported_environment());
    }
}
