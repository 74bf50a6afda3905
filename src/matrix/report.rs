//! Build result aggregation and the run report

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use console::style;
use serde::Serialize;

use super::{BuildResult, BuildStatus, Sketch};
use crate::error::MatrixError;
use crate::utils::paths::ensure_dir;
use crate::utils::terminal::{format_duration, print_error};

/// Text report appended after every sketch
pub const LOG_FILE_NAME: &str = "build_result.log";
/// JSON report written at the end of the run
pub const JSON_FILE_NAME: &str = "build_result.json";
/// Per-board directory receiving the builder output
pub const STD_DIR: &str = "std_folder";
/// Per-board directory receiving staged binaries
pub const BIN_DIR: &str = "binaries";

const BANNER: &str = "****************** PROCESSING COMPLETED ******************";

/// Results of one sketch across the board set
#[derive(Debug, Clone, Serialize)]
pub struct SketchReport {
    pub sketch: PathBuf,
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub errors: Vec<String>,
    pub results: Vec<BuildResult>,
}

impl SketchReport {
    fn new(sketch: &Sketch) -> Self {
        Self {
            sketch: sketch.path.clone(),
            passed: Vec::new(),
            failed: Vec::new(),
            errors: Vec::new(),
            results: Vec::new(),
        }
    }
}

/// Pass/fail split of the builds that reached a verdict, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentages {
    pub passed: f64,
    pub failed: f64,
}

/// Aggregate state of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub output_dir: PathBuf,
    /// Size of the board set every sketch is built against
    pub boards: usize,
    pub sketches: Vec<SketchReport>,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub total: usize,
    pub duration_secs: f64,
}

impl RunSummary {
    /// Pass/fail split over `passed + failed`; errored builds are left out
    ///
    /// `EmptyRun` when nothing was built, `None` when every build errored.
    pub fn percentages(&self) -> Result<Option<Percentages>, MatrixError> {
        if self.total == 0 {
            return Err(MatrixError::EmptyRun);
        }
        let decided = self.passed + self.failed;
        if decided == 0 {
            return Ok(None);
        }
        let decided = decided as f64;
        Ok(Some(Percentages {
            passed: self.passed as f64 * 100.0 / decided,
            failed: self.failed as f64 * 100.0 / decided,
        }))
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    /// Gate used by CI-strict mode
    pub fn check_strict(&self) -> Result<(), MatrixError> {
        if self.all_passed() {
            Ok(())
        } else {
            Err(MatrixError::BuildsFailed {
                failed: self.failed,
                errors: self.errors,
                total: self.total,
            })
        }
    }

    /// Every result that did not succeed, with its sketch
    pub fn unsuccessful(&self) -> impl Iterator<Item = (&SketchReport, &BuildResult)> {
        self.sketches.iter().flat_map(|report| {
            report
                .results
                .iter()
                .filter(|r| r.status != BuildStatus::Success)
                .map(move |r| (report, r))
        })
    }

    /// Export to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run summary")
    }

    pub fn log_file(&self) -> PathBuf {
        self.output_dir.join(LOG_FILE_NAME)
    }
}

/// How the aggregator reacts to individual results
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Copy each successful build's binary with this extension
    pub stage_artifacts: Option<String>,
    /// Print the captured log of every failed or errored build
    pub echo_failures: bool,
}

/// Sole owner of the [`RunSummary`] while a run is in progress
pub struct Aggregator {
    summary: RunSummary,
    current: Option<SketchReport>,
    options: ReportOptions,
}

impl Aggregator {
    /// Start a run report in `output_dir`, writing the log header
    pub fn new(output_dir: &Path, boards: usize, options: ReportOptions) -> Result<Self> {
        ensure_dir(output_dir)?;
        let started_at = Local::now();
        let summary = RunSummary {
            started_at,
            output_dir: output_dir.to_path_buf(),
            boards,
            sketches: Vec::new(),
            passed: 0,
            failed: 0,
            errors: 0,
            total: 0,
            duration_secs: 0.0,
        };

        let header = format!(
            "************************************** \n\
             *********** OUTPUT / RESULT ********** \n\
             ************************************** \n\
             {}\nFull path = {} \n",
            started_at.format("%A %d %B %Y %H:%M:%S "),
            output_dir.display()
        );
        fs::write(summary.log_file(), header).with_context(|| {
            format!("Failed to create {}", summary.log_file().display())
        })?;

        Ok(Self {
            summary,
            current: None,
            options,
        })
    }

    #[cfg(test)]
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Open the sweep of `sketch`
    pub fn begin_sketch(&mut self, sketch: &Sketch) {
        self.current = Some(SketchReport::new(sketch));
    }

    /// Record one result of the current sweep
    ///
    /// A binary that cannot be staged is fatal. Failed and errored builds never are.
    pub fn record(&mut self, sketch: &Sketch, result: BuildResult) -> Result<()> {
        self.summary.total += 1;
        match result.status {
            BuildStatus::Success => {
                self.summary.passed += 1;
                if let Some(ext) = &self.options.stage_artifacts {
                    stage_artifact(&self.summary.output_dir, sketch, &result, ext)?;
                }
            }
            BuildStatus::Failure => {
                self.summary.failed += 1;
            }
            BuildStatus::Error => {
                self.summary.errors += 1;
                print_error(&format!(
                    "Error building {} for {}: {}",
                    sketch.file_name,
                    result.board,
                    result.describe()
                ));
            }
        }

        if result.status != BuildStatus::Success && self.options.echo_failures {
            echo_log(&result);
        }

        let report = self
            .current
            .get_or_insert_with(|| SketchReport::new(sketch));
        match result.status {
            BuildStatus::Success => report.passed.push(result.board.clone()),
            BuildStatus::Failure => report.failed.push(result.board.clone()),
            BuildStatus::Error => report.errors.push(result.board.clone()),
        }
        report.results.push(result);
        Ok(())
    }

    /// Close the current sweep and append it to the log
    pub fn end_sketch(&mut self) -> Result<()> {
        let Some(report) = self.current.take() else {
            return Ok(());
        };
        let boards = self.summary.boards;

        let mut block = format!("\nSketch : {}", report.sketch.display());
        if !report.passed.is_empty() {
            block.push_str("\nBuild PASSED for these boards :\n");
            for board in &report.passed {
                block.push_str(&format!("{}\n", board));
            }
        }
        block.push_str(&format!(
            "Total build PASSED for this sketch : {} / {}",
            report.passed.len(),
            boards
        ));
        if !report.failed.is_empty() {
            block.push_str("\nBuild FAILED for these boards :\n");
            for board in &report.failed {
                block.push_str(&format!("{}\n", board));
            }
        }
        block.push_str(&format!(
            "\nTotal build FAILED for this sketch : {} / {}\n",
            report.failed.len(),
            boards
        ));
        if !report.errors.is_empty() {
            block.push_str("Build ERROR for these boards :\n");
            for board in &report.errors {
                block.push_str(&format!("{}\n", board));
            }
            block.push_str(&format!(
                "Total build ERROR for this sketch : {} / {}\n",
                report.errors.len(),
                boards
            ));
        }

        append(&self.summary.log_file(), &block)?;
        self.summary.sketches.push(report);
        Ok(())
    }

    /// Write the final block and the JSON report, then print the totals
    pub fn finish(mut self, duration: Duration) -> Result<RunSummary> {
        self.end_sketch()?;
        self.summary.duration_secs = duration.as_secs_f64();

        let summary = self.summary;
        let pct = summary.percentages()?;

        let mut block = format!("\n{}\n", BANNER);
        match pct {
            Some(pct) => {
                block.push_str(&format!("TOTAL PASSED : {} % \n", pct.passed));
                block.push_str(&format!("TOTAL FAILED : {} % \n", pct.failed));
            }
            None => block.push_str("TOTAL PASSED : - \nTOTAL FAILED : - \n"),
        }
        if summary.errors > 0 {
            block.push_str(&format!(
                "TOTAL ERROR : {} / {} \n",
                summary.errors, summary.total
            ));
        }
        block.push_str(&format!(
            "Duration : {}\n",
            format_duration(summary.duration_secs)
        ));
        block.push_str(&format!(
            "Logs are available here: {}",
            summary.output_dir.display()
        ));
        append(&summary.log_file(), &block)?;

        let json_path = summary.output_dir.join(JSON_FILE_NAME);
        fs::write(&json_path, summary.to_json()?)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;

        println!("\n{}", BANNER);
        let passed_line = count_line("PASSED", summary.passed, summary.total, pct.map(|p| p.passed));
        println!("{}", style(passed_line).green());
        let failed_line = count_line("FAILED", summary.failed, summary.total, pct.map(|p| p.failed));
        if summary.failed > 0 {
            println!("{}", style(failed_line).red());
        } else {
            println!("{}", failed_line);
        }
        if summary.errors > 0 {
            let error_line = count_line("ERROR", summary.errors, summary.total, None);
            println!("{}", style(error_line).red().bold());
        }
        println!("Logs are available here: {}", summary.output_dir.display());

        Ok(summary)
    }
}

/// `LABEL = count/total (pct%)`, without the share when there is none
fn count_line(label: &str, count: usize, total: usize, pct: Option<f64>) -> String {
    match pct {
        Some(pct) => format!("{} = {}/{} ({}%) ", label, count, total, pct.round()),
        None => format!("{} = {}/{} ", label, count, total),
    }
}

fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Copy `<build_path>/<sketch file>.<ext>` into `<out>/<board>/binaries/`
fn stage_artifact(output_dir: &Path, sketch: &Sketch, result: &BuildResult, ext: &str) -> Result<()> {
    let file_name = format!("{}.{}", sketch.file_name, ext);
    let source_path = result.build_path.join(&file_name);
    let dest_dir = output_dir.join(&result.board).join(BIN_DIR);
    ensure_dir(&dest_dir)?;

    fs::copy(&source_path, dest_dir.join(&file_name)).map_err(|source| {
        MatrixError::ArtifactCopy {
            source_path: source_path.clone(),
            dest_dir: dest_dir.clone(),
            source,
        }
    })?;
    Ok(())
}

fn echo_log(result: &BuildResult) {
    let Some(log) = result.failure_log() else {
        return;
    };
    eprintln!(
        "{}",
        style(format!("--- {} ({}) ---", log.display(), result.status)).dim()
    );
    match fs::read_to_string(log) {
        Ok(content) => eprintln!("{}", content.trim_end()),
        Err(e) => eprintln!("   (log unavailable: {})", e),
    }
}
