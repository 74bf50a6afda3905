//! Path utilities for sketch-matrix

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::DirEntry;

use crate::utils::terminal::print_warning;

/// Name of the configuration file looked up in the current directory
pub const CONFIG_FILE_NAME: &str = "SketchMatrix.toml";

/// Ensure a directory exists
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a directory tree if it exists, ignoring a missing directory
pub fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    std::fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    Ok(true)
}

/// Home directory of the current user
pub fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Resolve `path` against `base` when it is relative
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Keep a walked entry, warning about one that could not be read
pub fn readable_entry(entry: walkdir::Result<DirEntry>) -> Option<DirEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(err) => {
            let path = err
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            print_warning(&format!("Skipping {}: {}", path, err));
            None
        }
    }
}
