//! Subprocess execution with output capture and timeout support

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::utils::paths::ensure_dir;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Where the output of a child process is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputCapture {
    /// stdout and stderr in two files
    Split { stdout: PathBuf, stderr: PathBuf },
    /// stdout and stderr interleaved in one file
    Combined(PathBuf),
}

impl OutputCapture {
    /// Files written by this capture, stdout first
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            OutputCapture::Split { stdout, stderr } => vec![stdout.as_path(), stderr.as_path()],
            OutputCapture::Combined(log) => vec![log.as_path()],
        }
    }

    fn open(&self) -> Result<(Stdio, Stdio)> {
        for path in self.paths() {
            if let Some(parent) = path.parent() {
                ensure_dir(parent)?;
            }
        }
        match self {
            OutputCapture::Split { stdout, stderr } => Ok((
                create_file(stdout)?.into(),
                create_file(stderr)?.into(),
            )),
            OutputCapture::Combined(log) => {
                let out = create_file(log)?;
                let err = out
                    .try_clone()
                    .with_context(|| format!("Failed to share {}", log.display()))?;
                Ok((out.into(), err.into()))
            }
        }
    }
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// Result of a subprocess execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Process exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,

    /// Whether the process was killed after exceeding its timeout
    pub timed_out: bool,

    /// Execution duration
    pub duration: Duration,
}

impl CommandResult {
    fn from_status(status: ExitStatus, timed_out: bool, duration: Duration) -> Self {
        Self {
            exit_code: status.code(),
            timed_out,
            duration,
        }
    }
}

/// Run `argv` to completion with its output redirected to `capture`
///
/// Stdin is closed. With a timeout the child is killed once it expires and the
/// result is flagged `timed_out`. An error is returned only when the process
/// could not be started or waited for.
pub fn run_captured(
    argv: &[String],
    capture: &OutputCapture,
    timeout: Option<Duration>,
) -> Result<CommandResult> {
    let Some((program, args)) = argv.split_first() else {
        bail!("Cannot run an empty command");
    };

    let (stdout, stderr) = capture.open()?;
    let start = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .with_context(|| format!("Failed to execute {}", program))?;

    match timeout {
        Some(limit) => wait_with_timeout(&mut child, limit, start, program),
        None => {
            let status = child
                .wait()
                .with_context(|| format!("Failed to wait for {}", program))?;
            Ok(CommandResult::from_status(status, false, start.elapsed()))
        }
    }
}

fn wait_with_timeout(
    child: &mut Child,
    limit: Duration,
    start: Instant,
    program: &str,
) -> Result<CommandResult> {
    loop {
        let status = child
            .try_wait()
            .with_context(|| format!("Failed to wait for {}", program))?;
        if let Some(status) = status {
            return Ok(CommandResult::from_status(status, false, start.elapsed()));
        }

        if start.elapsed() >= limit {
            // The child may exit between try_wait and kill
            let _ = child.kill();
            let status = child
                .wait()
                .with_context(|| format!("Failed to reap {} after timeout", program))?;
            return Ok(CommandResult::from_status(status, true, start.elapsed()));
        }

        thread::sleep(POLL_INTERVAL);
    }
}
