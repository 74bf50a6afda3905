//! Error types and helpers for user-friendly error messages
//!
//! Every precondition the matrix checks before spawning a build has its own
//! variant here, each with an actionable hint. Per-task build failures are not
//! errors: they are recorded in the run summary instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a matrix run
#[derive(Error, Debug)]
pub enum MatrixError {
    /// Missing or invalid configuration, including required toolchain paths
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        hint: Option<String>,
    },

    /// A sketch, board or exclusion pattern is not a valid regular expression
    #[error("Invalid pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Nothing left to build once selection and exclusion were applied
    #[error("No sketch to build!")]
    EmptySelection,

    /// No board definition matched
    #[error("No board found!")]
    NoBoardsFound,

    /// An explicit sketch path resolves neither as given nor under the toolchain root
    #[error("Sketch path does not exist: {reference}")]
    UnresolvableReference { reference: String },

    /// A successful build's binary could not be staged
    #[error("Impossible to copy the binary {} into {}", source_path.display(), dest_dir.display())]
    ArtifactCopy {
        source_path: PathBuf,
        dest_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Percentages were requested for a run that recorded no build
    #[error("Cannot compute build percentages: no build was recorded")]
    EmptyRun,

    /// CI-strict mode and at least one build did not pass
    #[error("{failed} build(s) failed and {errors} errored out of {total}")]
    BuildsFailed {
        failed: usize,
        errors: usize,
        total: usize,
    },
}

impl MatrixError {
    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            hint: None,
        }
    }

    /// Create a configuration error with a hint
    pub fn config_error_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Hint shown under the error, if any
    pub fn hint(&self) -> Option<&str> {
        match self {
            MatrixError::Configuration { hint, .. } => hint.as_deref(),
            MatrixError::InvalidPattern { .. } => Some(hints::invalid_pattern()),
            MatrixError::EmptySelection => Some(hints::empty_selection()),
            MatrixError::NoBoardsFound => Some(hints::no_boards()),
            MatrixError::UnresolvableReference { .. } => Some(hints::unresolvable_sketch()),
            MatrixError::ArtifactCopy { .. } => Some(hints::artifact_copy()),
            MatrixError::EmptyRun | MatrixError::BuildsFailed { .. } => None,
        }
    }

    /// Display error with formatting and hints
    pub fn display_with_hints(&self) {
        use console::style;

        eprintln!("\n{} {}", style("ERROR:").red().bold(), self);

        match self {
            MatrixError::InvalidPattern { source, .. } => {
                eprintln!("  {}", style(source).dim());
            }
            MatrixError::ArtifactCopy { source, .. } => {
                eprintln!("  {}", style(source).dim());
            }
            _ => {}
        }

        if let Some(h) = self.hint() {
            eprintln!("\n{} {}", style("HINT:").yellow().bold(), h);
        }

        eprintln!();
    }
}

/// Common error hints
pub mod hints {
    /// Hint for a missing configuration file
    pub fn config_not_found() -> &'static str {
        "Could not find SketchMatrix.toml.\n\
         \n\
         • Run: sketch-matrix init   to write the default configuration\n\
         • Or pass --config <path> (or set SKETCH_MATRIX_CONFIG)"
    }

    /// Hint for a required toolchain path that does not exist
    pub fn missing_path(key: &str) -> String {
        format!(
            "Please set '{}' in SketchMatrix.toml to an existing directory.",
            key
        )
    }

    /// Hint for a missing builder executable
    pub fn builder_not_found() -> &'static str {
        "The builder executable is looked up relative to [toolchain].root, then on PATH.\n\
         Set [toolchain].builder to the arduino-builder executable."
    }

    /// Hint for a bad regular expression
    pub fn invalid_pattern() -> &'static str {
        "Patterns are regular expression fragments matched as '.*(pattern).*',\n\
         case-insensitive. Escape special characters such as '(' or '+'."
    }

    /// Hint for an empty sketch selection
    pub fn empty_selection() -> &'static str {
        "Check the sketch pattern (-s), the sketch list (-f) and the exclusion list (-e).\n\
         Every candidate may have been removed by an exclusion pattern."
    }

    /// Hint for an empty board catalog
    pub fn no_boards() -> &'static str {
        "No line of the form '<board>.menu.pnum.<name>=<label>' was found in any\n\
         board definition file under [toolchain].packages or <root>/hardware,\n\
         or the board pattern (-b) matched none of them."
    }

    /// Hint for an unresolvable single sketch
    pub fn unresolvable_sketch() -> &'static str {
        "Give an existing path, or a path relative to [toolchain].root\n\
         (e.g. examples/01.Basics/Blink/Blink.ino)."
    }

    /// Hint for an artifact staging failure
    pub fn artifact_copy() -> &'static str {
        "The builder reported success but its binary is missing or unreadable.\n\
         Check [run].artifact_extension and the scratch directory [output].scratch."
    }
}
