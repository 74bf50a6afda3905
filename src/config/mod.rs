//! Configuration loading and toolchain layout resolution

pub mod matrix_toml;
pub mod validation;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use matrix_toml::{
    BoardsConfig, MatrixConfig, OutputConfig, RunConfig, SketchesConfig, ToolchainConfig,
    VariantConfig,
};

use crate::error::{hints, MatrixError};
use crate::utils::tools::locate_builder;

/// Toolchain directories checked to exist and made absolute
///
/// Built once per run before any task is spawned, so a missing directory is
/// reported as a configuration error instead of a failed build.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolchainLayout {
    pub root: PathBuf,
    pub packages: PathBuf,
    pub sketchbook: PathBuf,
    pub builder: PathBuf,
    pub hardware_dirs: Vec<PathBuf>,
    pub tools_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
}

impl ToolchainLayout {
    /// Resolve the layout described by the [toolchain] section
    pub fn resolve(config: &ToolchainConfig) -> Result<Self> {
        let root = existing_dir("toolchain.root", &config.root)?;
        let packages = existing_dir("toolchain.packages", &config.packages)?;
        let sketchbook = existing_dir("toolchain.sketchbook", &config.sketchbook)?;
        let builder = locate_builder(&root, &config.builder)?;

        let mut hardware_dirs = vec![root.join("hardware"), packages.clone()];
        hardware_dirs.extend(config.extra_hardware.iter().cloned());

        let mut tools_dirs = vec![root.join("tools-builder"), packages.clone()];
        tools_dirs.extend(config.extra_tools.iter().cloned());

        let mut library_dirs = vec![root.join("libraries"), sketchbook.join("libraries")];
        library_dirs.extend(config.extra_libraries.iter().cloned());

        Ok(Self {
            root,
            packages,
            sketchbook,
            builder,
            hardware_dirs,
            tools_dirs,
            library_dirs,
        })
    }

    /// Roots searched for board definition files, in scan order
    pub fn catalog_roots(&self) -> Vec<PathBuf> {
        vec![self.packages.clone(), self.root.join("hardware")]
    }
}

fn existing_dir(key: &str, path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(MatrixError::config_error_with_hint(
            format!("Path does not exist: {} ({})", path.display(), key),
            hints::missing_path(key),
        )
        .into());
    }
    path.canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))
}
