//! Build matrix scheduling and execution
//!
//! Sketches are processed one after another. The boards of a sketch run either
//! one at a time or on a fixed-size rayon pool; in both cases results reach the
//! aggregator in board order.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use console::{style, StyledObject};
use rayon::prelude::*;

use super::command::CommandBuilder;
use super::report::{Aggregator, STD_DIR};
use super::{Board, BuildResult, BuildStatus, BuildTask, Sketch};
use crate::exec::{run_captured, OutputCapture};
use crate::utils::paths::ensure_dir;
use crate::utils::terminal::create_progress_bar;

/// How the boards of one sketch are run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One build at a time, stdout and stderr in separate files
    Sequential,
    /// Up to `jobs` builds at once, output combined in one log per build
    Parallel { jobs: usize },
}

impl ExecutionMode {
    pub fn is_parallel(&self) -> bool {
        matches!(self, ExecutionMode::Parallel { .. })
    }
}

pub struct Scheduler<'a> {
    builder: CommandBuilder<'a>,
    mode: ExecutionMode,
    output_dir: PathBuf,
    timeout: Option<Duration>,
}

impl<'a> Scheduler<'a> {
    /// Parallel mode always gives each board its own build path
    pub fn new(builder: CommandBuilder<'a>, mode: ExecutionMode, output_dir: &Path) -> Self {
        let builder = if mode.is_parallel() {
            builder.per_board_build_path(true)
        } else {
            builder
        };
        Self {
            builder,
            mode,
            output_dir: output_dir.to_path_buf(),
            timeout: None,
        }
    }

    /// Kill builds running longer than `timeout`
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every (sketch, board) task, sketch-major
    pub fn plan<'t>(&self, sketches: &'t [Sketch], boards: &'t [Board]) -> Vec<BuildTask<'t>> {
        sketches
            .iter()
            .flat_map(|sketch| boards.iter().map(move |board| self.task(sketch, board)))
            .collect()
    }

    fn task<'t>(&self, sketch: &'t Sketch, board: &'t Board) -> BuildTask<'t> {
        let std_dir = self.output_dir.join(&board.dir_name).join(STD_DIR);
        let capture = match self.mode {
            ExecutionMode::Sequential => OutputCapture::Split {
                stdout: std_dir.join(format!("{}_stdout.txt", sketch.name)),
                stderr: std_dir.join(format!("{}_stderr.txt", sketch.name)),
            },
            ExecutionMode::Parallel { .. } => {
                OutputCapture::Combined(std_dir.join(format!("{}.log", sketch.name)))
            }
        };
        BuildTask {
            sketch,
            board,
            command: self.builder.command(board, sketch),
            build_path: self.builder.build_path(board),
            capture,
        }
    }

    /// Run the whole matrix, handing every result to `aggregator`
    ///
    /// Only an aggregator error stops the run; build failures are recorded.
    pub fn run(&self, sketches: &[Sketch], boards: &[Board], aggregator: &mut Aggregator) -> Result<()> {
        if boards.is_empty() {
            return Ok(());
        }
        let pool = match self.mode {
            ExecutionMode::Parallel { jobs } => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs.max(1))
                    .build()
                    .context("Failed to create build worker pool")?,
            ),
            ExecutionMode::Sequential => None,
        };

        let tasks = self.plan(sketches, boards);
        for (index, sweep) in tasks.chunks(boards.len()).enumerate() {
            let sketch = sweep[0].sketch;
            println!(
                "\nRUNNING : {} ({}/{}) ",
                sketch.file_name,
                index + 1,
                sketches.len()
            );
            println!("Sketch path : {}", sketch.path.display());
            aggregator.begin_sketch(sketch);

            match &pool {
                None => {
                    for (n, task) in sweep.iter().enumerate() {
                        print!("Build {} ({}/{})... ", task.board.dir_name, n + 1, sweep.len());
                        let _ = std::io::stdout().flush();
                        let result = self.execute(task);
                        println!("{}", status_label(result.status));
                        aggregator.record(sketch, result)?;
                    }
                }
                Some(pool) => {
                    let pb = create_progress_bar(sweep.len() as u64, &sketch.name);
                    let results: Vec<BuildResult> = pool.install(|| {
                        sweep
                            .par_iter()
                            .map(|task| {
                                let result = self.execute(task);
                                pb.inc(1);
                                result
                            })
                            .collect()
                    });
                    pb.finish_and_clear();

                    for (n, result) in results.into_iter().enumerate() {
                        println!(
                            "Build {} ({}/{})... {}",
                            result.board,
                            n + 1,
                            sweep.len(),
                            status_label(result.status)
                        );
                        aggregator.record(sketch, result)?;
                    }
                }
            }
            aggregator.end_sketch()?;
        }
        Ok(())
    }

    /// Run one task; never fails, problems are classified as `Error`
    fn execute(&self, task: &BuildTask) -> BuildResult {
        let start = Instant::now();
        let outcome = ensure_dir(&task.build_path)
            .and_then(|_| run_captured(&task.command, &task.capture, self.timeout));

        let mut result = BuildResult {
            board: task.board.dir_name.clone(),
            sketch: task.sketch.name.clone(),
            status: BuildStatus::Error,
            exit_code: None,
            timed_out: false,
            logs: task.capture.paths().into_iter().map(Path::to_path_buf).collect(),
            build_path: task.build_path.clone(),
            duration: start.elapsed(),
            message: None,
        };
        match outcome {
            Ok(run) => {
                result.status = BuildStatus::classify(run.exit_code, run.timed_out);
                result.exit_code = run.exit_code;
                result.timed_out = run.timed_out;
                result.duration = run.duration;
            }
            Err(e) => result.message = Some(format!("{:#}", e)),
        }
        result
    }
}

fn status_label(status: BuildStatus) -> StyledObject<String> {
    let label = status.to_string();
    match status {
        BuildStatus::Success => style(label).green(),
        BuildStatus::Failure => style(label).red(),
        BuildStatus::Error => style(label).red().bold(),
    }
}
