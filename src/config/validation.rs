//! Configuration validation with helpful error messages
//!
//! Only the shape of the values is checked here. Whether the toolchain paths
//! exist is checked when the layout is resolved, right before a run.

use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use super::{MatrixConfig, RunConfig, VariantConfig};
use crate::error::MatrixError;

/// Validate the entire configuration
pub fn validate_config(config: &MatrixConfig) -> Result<()> {
    validate_ide_version(&config.toolchain.ide_version)?;
    validate_variant(&config.variant)?;
    validate_run(&config.run)?;

    if config.sketches.suffix.trim().is_empty() || config.sketches.suffix.contains('.') {
        return Err(MatrixError::config_error_with_hint(
            format!("Invalid sketch suffix '{}'", config.sketches.suffix),
            "Give the extension without a dot, e.g. suffix = \"ino\"",
        )
        .into());
    }

    if let Err(e) = glob::Pattern::new(&config.boards.definition_file) {
        return Err(MatrixError::config_error_with_hint(
            format!(
                "Invalid board definition file pattern '{}': {}",
                config.boards.definition_file, e
            ),
            "Use a file name or glob such as \"boards.txt\"",
        )
        .into());
    }

    Ok(())
}

static DIGITS: OnceLock<Regex> = OnceLock::new();

fn validate_ide_version(version: &str) -> Result<()> {
    let digits = DIGITS.get_or_init(|| Regex::new(r"^[0-9]+$").expect("static regex"));
    if !digits.is_match(version) {
        return Err(MatrixError::config_error_with_hint(
            format!("Invalid ide_version '{}'", version),
            "The builder expects the IDE version as a plain number, e.g. \"10805\" for 1.8.5",
        )
        .into());
    }
    Ok(())
}

/// Variant fields are joined with ':' ',' and '=' so they cannot contain them
fn validate_variant(variant: &VariantConfig) -> Result<()> {
    let mut fields = vec![
        ("vendor", variant.vendor.as_str()),
        ("architecture", variant.architecture.as_str()),
        ("upload_method", variant.upload_method.as_str()),
        ("serial_mode", variant.serial_mode.as_str()),
        ("build_option", variant.build_option.as_str()),
    ];
    if let Some(usb) = &variant.usb_mode {
        fields.push(("usb_mode", usb.as_str()));
    }

    for (key, value) in fields {
        if value.trim().is_empty() {
            return Err(MatrixError::config_error_with_hint(
                format!("[variant].{} cannot be empty", key),
                "Remove the key to use its default value",
            )
            .into());
        }
        if value.contains([':', ',', '=']) || value.chars().any(char::is_whitespace) {
            return Err(MatrixError::config_error_with_hint(
                format!("[variant].{} contains a reserved character: '{}'", key, value),
                "Variant fields cannot contain ':', ',', '=' or whitespace",
            )
            .into());
        }
    }

    Ok(())
}

fn validate_run(run: &RunConfig) -> Result<()> {
    if run.jobs == Some(0) {
        return Err(MatrixError::config_error_with_hint(
            "[run].jobs must be at least 1",
            "Remove the key to use one worker per CPU",
        )
        .into());
    }
    if run.timeout_secs == Some(0) {
        return Err(MatrixError::config_error_with_hint(
            "[run].timeout_secs must be at least 1",
            "Remove the key to let builds run without a time limit",
        )
        .into());
    }
    if run.artifact_extension.trim().is_empty() {
        return Err(MatrixError::config_error("[run].artifact_extension cannot be empty").into());
    }
    Ok(())
}
