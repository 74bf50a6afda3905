//! Init command implementation

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::config::MatrixConfig;
use crate::error::MatrixError;
use crate::utils::paths::CONFIG_FILE_NAME;
use crate::utils::terminal::{print_info, print_success};

const HEADER: &str = "\
# sketch-matrix configuration
#
# Paths may start with '~'. Only the [toolchain] paths are required to exist.
";

/// Write a default SketchMatrix.toml for this platform
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    /// Execute the init command
    pub fn execute(self, config_path: Option<&Path>, verbose: bool) -> Result<()> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        write_default_config(&path, self.force)?;

        print_success(&format!("Created {}", path.display()));
        if verbose {
            print_info("Edit [toolchain] root, packages and sketchbook before building");
        }
        Ok(())
    }
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(MatrixError::config_error_with_hint(
            format!("{} already exists", path.display()),
            "Use --force to overwrite it",
        )
        .into());
    }

    let content = format!("{}\n{}", HEADER, MatrixConfig::default().to_toml()?);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
