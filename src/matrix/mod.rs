//! Sketch × board build matrix
//!
//! ```text
//! sketches ─┐
//!           ├─> scheduler ─> builder process per (sketch, board) ─> report
//! boards ───┘      ^
//!               command
//! ```

pub mod boards;
pub mod command;
pub mod report;
pub mod scheduler;
pub mod sketches;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::config::VariantConfig;
use crate::exec::OutputCapture;

pub use boards::load_boards;
pub use command::CommandBuilder;
pub use report::{Aggregator, RunSummary};
pub use scheduler::{ExecutionMode, Scheduler};
pub use sketches::{SketchResolver, SketchSelection};

/// One buildable sketch
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Sketch {
    /// Absolute path of the sketch entry file
    pub path: PathBuf,
    /// File stem, used to name log files
    pub name: String,
    /// File name with extension, used to name the produced binary
    pub file_name: String,
}

impl Sketch {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            file_name,
        }
    }
}

/// One board variant read from a definition file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Board family, the key prefix before `.menu.pnum.`
    pub family: String,
    /// Variant identifier, the `pnum` value
    pub identifier: String,
    /// Name of the board's output subdirectory, unique within a catalog
    pub dir_name: String,
    /// Fields of the variant string shared by every board
    pub options: VariantConfig,
}

impl Board {
    /// Fully-qualified variant string passed to the builder with `-fqbn`
    pub fn variant_string(&self) -> String {
        let opts = &self.options;
        let mut fqbn = format!(
            "{}:{}:{}:pnum={},upload_method={},xserial={}",
            opts.vendor,
            opts.architecture,
            self.family,
            self.identifier,
            opts.upload_method,
            opts.serial_mode
        );
        if let Some(usb) = &opts.usb_mode {
            fqbn.push_str(&format!(",usb={}", usb));
        }
        fqbn.push_str(&format!(",opt={}", opts.build_option));
        fqbn
    }
}

/// A (sketch, board) pair with everything needed to run it
#[derive(Debug, Clone)]
pub struct BuildTask<'a> {
    pub sketch: &'a Sketch,
    pub board: &'a Board,
    /// Full argument vector, program first
    pub command: Vec<String>,
    /// Directory given to the builder with `-build-path`
    pub build_path: PathBuf,
    /// Log files receiving the builder output
    pub capture: OutputCapture,
}

/// Classification of a finished build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// Exit code 0
    Success,
    /// Exit code 1, the builder reported a compilation failure
    Failure,
    /// Any other exit, a signal, a timeout or a spawn failure
    Error,
}

impl BuildStatus {
    /// Classify a process exit
    pub fn classify(exit_code: Option<i32>, timed_out: bool) -> Self {
        if timed_out {
            return BuildStatus::Error;
        }
        match exit_code {
            Some(0) => BuildStatus::Success,
            Some(1) => BuildStatus::Failure,
            _ => BuildStatus::Error,
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "SUCCESS"),
            BuildStatus::Failure => write!(f, "FAILED"),
            BuildStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of one build task
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    /// Output directory name of the board
    pub board: String,
    /// Sketch file stem
    pub sketch: String,
    pub status: BuildStatus,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Captured output files, stdout first
    pub logs: Vec<PathBuf>,
    /// Where the builder wrote its outputs
    #[serde(skip)]
    pub build_path: PathBuf,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Why the process could not be run, when it never started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BuildResult {
    /// Log file that best explains a failure: stderr when split, else the combined log
    pub fn failure_log(&self) -> Option<&Path> {
        self.logs.last().map(PathBuf::as_path)
    }

    /// Short description of a non-successful outcome
    pub fn describe(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        if self.timed_out {
            return "build timed out and was killed".to_string();
        }
        match self.exit_code {
            Some(code) => format!("builder exited with code {}", code),
            None => "builder terminated by a signal".to_string(),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}


#[cfg(test)]
pub(crate) use tests::board as test_board;
