//! Clean command implementation

use std::path::Path;

use anyhow::Result;
use clap::Args;
use walkdir::WalkDir;

use crate::config::MatrixConfig;
use crate::utils::paths::remove_dir_if_exists;
use crate::utils::terminal::{print_info, print_success};

/// Delete the output root with every previous run
#[derive(Args, Debug)]
pub struct CleanCommand {
    /// Show what would be deleted
    #[arg(long)]
    pub dry_run: bool,
}

impl CleanCommand {
    /// Execute the clean command
    pub fn execute(self, config_path: Option<&Path>, _verbose: bool) -> Result<()> {
        let config = MatrixConfig::load(config_path)?;
        let root = &config.output.root;

        if self.dry_run {
            if root.is_dir() {
                println!(
                    "  [DRY RUN] Would remove: {} ({})",
                    root.display(),
                    format_size(dir_size(root))
                );
            } else {
                print_info(&format!("Nothing to clean in {}", root.display()));
            }
            return Ok(());
        }

        clean_output(root)
    }
}

/// Remove the output root, reporting what was freed
pub fn clean_output(root: &Path) -> Result<()> {
    let size = dir_size(root);
    if remove_dir_if_exists(root)? {
        print_success(&format!("Removed {} ({})", root.display(), format_size(size)));
    } else {
        print_info(&format!("Nothing to clean in {}", root.display()));
    }
    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

fn format_size(size_bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}
