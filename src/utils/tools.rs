//! Builder executable detection

use std::path::{Path, PathBuf};

use anyhow::Result;
use which::which;

use crate::error::{hints, MatrixError};

/// Locate the builder executable
///
/// An absolute path is used as-is. A relative one is first resolved against the
/// toolchain root, then looked up on `PATH`.
pub fn locate_builder(root: &Path, builder: &Path) -> Result<PathBuf> {
    let candidate = crate::utils::paths::resolve_against(root, builder);
    if candidate.is_file() {
        return Ok(candidate);
    }

    if !builder.is_absolute() {
        if let Ok(found) = which(builder) {
            return Ok(found);
        }
    }

    Err(MatrixError::config_error_with_hint(
        format!("Builder executable not found: {}", candidate.display()),
        hints::builder_not_found(),
    )
    .into())
}
