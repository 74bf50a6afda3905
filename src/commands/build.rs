//! Build command implementation

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use clap::{ArgGroup, Args};

use crate::commands::clean::clean_output;
use crate::config::{MatrixConfig, ToolchainLayout};
use crate::matrix::report::ReportOptions;
use crate::matrix::{
    load_boards, Aggregator, CommandBuilder, ExecutionMode, Scheduler, SketchResolver,
    SketchSelection,
};
use crate::reporting::{write_junit, CiReporter};
use crate::utils::paths::{ensure_dir, remove_dir_if_exists};
use crate::utils::terminal::{format_duration, print_info, print_warning};

/// Build sketches for every selected board
///
/// Without a selection flag the configured default sketch is built.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("selection").args(["all", "sketches", "ino", "file"])))]
pub struct BuildCommand {
    /// Build all sketches found under the toolchain root
    #[arg(short, long)]
    pub all: bool,

    /// Build every sketch whose path matches the pattern
    #[arg(short, long, value_name = "PATTERN")]
    pub sketches: Option<String>,

    /// Build a single sketch, absolute or relative to the toolchain root
    #[arg(short, long, value_name = "PATH")]
    pub ino: Option<PathBuf>,

    /// Build the sketches listed in a file, one path per line
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// File of patterns excluding sketches (with --all or --sketches)
    #[arg(short, long, value_name = "FILE")]
    pub exclude: Option<PathBuf>,

    /// Only build boards whose definition key matches the pattern
    #[arg(short, long, value_name = "PATTERN")]
    pub board: Option<String>,

    /// Save the binary of every successful build
    #[arg(long, conflicts_with = "ci")]
    pub bin: bool,

    /// CI mode: print the log of failed builds and exit non-zero on failure
    #[arg(long)]
    pub ci: bool,

    /// Exit non-zero when any build fails or errors
    #[arg(long)]
    pub strict: bool,

    /// Print the captured log of failed builds
    #[arg(long)]
    pub echo_failures: bool,

    /// Build the boards of each sketch in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Number of parallel builds (defaults to the CPU count)
    #[arg(short, long, value_name = "N", requires = "parallel")]
    pub jobs: Option<NonZeroUsize>,

    /// Kill a build after this many seconds and count it as an error
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Delete the output root before building
    #[arg(long)]
    pub clean: bool,

    /// Also write a JUnit XML report to this file
    #[arg(long, value_name = "FILE")]
    pub junit: Option<PathBuf>,
}

impl BuildCommand {
    fn selection(&self) -> SketchSelection {
        if let Some(path) = &self.ino {
            SketchSelection::Single(path.clone())
        } else if let Some(list) = &self.file {
            SketchSelection::ListFile(list.clone())
        } else if self.all || self.sketches.is_some() {
            SketchSelection::All {
                pattern: self.sketches.clone(),
            }
        } else {
            SketchSelection::Default
        }
    }

    fn mode(&self, config: &MatrixConfig) -> ExecutionMode {
        if !self.parallel {
            return ExecutionMode::Sequential;
        }
        let jobs = self
            .jobs
            .map(NonZeroUsize::get)
            .or(config.run.jobs)
            .unwrap_or_else(num_cpus);
        ExecutionMode::Parallel { jobs }
    }

    /// Execute the build command
    pub fn execute(self, config_path: Option<&Path>, verbose: bool) -> Result<()> {
        let start = Instant::now();
        let config = MatrixConfig::load(config_path)?;
        let layout = ToolchainLayout::resolve(&config.toolchain)?;

        let sketches = SketchResolver::new(&layout.root, &config.sketches)
            .resolve(&self.selection(), self.exclude.as_deref())?;
        let boards = load_boards(
            &layout.catalog_roots(),
            &config.boards.definition_file,
            self.board.as_deref(),
            &config.variant,
        )?;

        if self.clean {
            clean_output(&config.output.root)?;
        }

        let build_id = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let output_dir = config.output.root.join(format!("build_{}", build_id));
        let mut scratch = config.output.scratch.clone().into_os_string();
        scratch.push(format!("_{}", build_id));
        let scratch = PathBuf::from(scratch);

        let mode = self.mode(&config);
        let timeout = self.timeout.or(config.run.timeout_secs).map(Duration::from_secs);

        eprintln!("\n{}", "=".repeat(80));
        eprintln!(
            "Building {} sketch(es) for {} board(s): {} build(s)",
            sketches.len(),
            boards.len(),
            sketches.len() * boards.len()
        );
        match mode {
            ExecutionMode::Sequential => eprintln!("Mode: sequential"),
            ExecutionMode::Parallel { jobs } => eprintln!("Mode: parallel ({} workers)", jobs),
        }
        if let Some(limit) = timeout {
            eprintln!("Timeout: {} per build", format_duration(limit.as_secs_f64()));
        }
        eprintln!("Output: {}", output_dir.display());
        eprintln!("{}", "=".repeat(80));

        let builder = CommandBuilder::new(&layout, &config.toolchain.ide_version, scratch.clone())
            .per_board_build_path(config.run.per_board_build_path)
            .verbose(verbose);
        let scheduler = Scheduler::new(builder, mode, &output_dir).timeout(timeout);

        let options = ReportOptions {
            stage_artifacts: self.bin.then(|| config.run.artifact_extension.clone()),
            echo_failures: self.echo_failures || self.ci,
        };
        let mut aggregator = Aggregator::new(&output_dir, boards.len(), options)?;

        ensure_dir(&scratch)?;
        let outcome = scheduler.run(&sketches, &boards, &mut aggregator);
        if let Err(e) = remove_dir_if_exists(&scratch) {
            print_warning(&format!("{:#}", e));
        }
        outcome?;

        let summary = aggregator.finish(start.elapsed())?;

        if let Some(path) = &self.junit {
            write_junit(&summary, path)?;
            if verbose {
                print_info(&format!("JUnit report written to {}", path.display()));
            }
        }
        CiReporter::auto_detect().report(&summary);

        if self.strict || self.ci {
            summary.check_strict()?;
        }
        Ok(())
    }
}

/// Get number of CPUs for parallel builds
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}
