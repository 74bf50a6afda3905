//! Board catalog loading from `boards.txt` definition files

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use super::sketches::compile_pattern;
use super::Board;
use crate::config::VariantConfig;
use crate::error::MatrixError;
use crate::utils::paths::readable_entry;

/// `<family>.menu.pnum.<identifier>=<label>`
static BOARD_KEY: OnceLock<Regex> = OnceLock::new();

fn board_key() -> &'static Regex {
    BOARD_KEY.get_or_init(|| {
        Regex::new(r"^(.+)\.menu\.pnum\.([^.]+)=").expect("static regex")
    })
}

/// Extract `(family, identifier)` pairs from one definition file
///
/// With a filter, only entries whose matched key satisfies it are kept.
pub fn parse_definitions(content: &str, filter: Option<&Regex>) -> Vec<(String, String)> {
    let key = board_key();
    content
        .lines()
        .filter_map(|line| key.captures(line))
        .filter(|caps| filter.map_or(true, |f| f.is_match(&caps[0])))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Definition files under `root` whose name matches `file_pattern`, empty files skipped
fn definition_files(root: &Path, file_pattern: &glob::Pattern) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(readable_entry)
        .filter(|e| e.file_type().is_file())
        .filter(|e| file_pattern.matches(&e.file_name().to_string_lossy()))
        .filter(|e| e.metadata().map(|m| m.len() > 0).unwrap_or(false))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Load the board catalog from every root, merged, deduplicated and sorted
///
/// Roots that do not exist are skipped. Every board shares `options`.
pub fn load_boards(
    roots: &[PathBuf],
    definition_file: &str,
    pattern: Option<&str>,
    options: &VariantConfig,
) -> Result<Vec<Board>> {
    let file_pattern = glob::Pattern::new(definition_file).map_err(|e| {
        MatrixError::config_error(format!(
            "Invalid board definition file pattern '{}': {}",
            definition_file, e
        ))
    })?;
    let filter = pattern.map(compile_pattern).transpose()?;

    let mut entries = BTreeSet::new();
    for root in roots.iter().filter(|r| r.is_dir()) {
        for file in definition_files(root, &file_pattern) {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read board definitions {}", file.display()))?;
            entries.extend(parse_definitions(&content, filter.as_ref()));
        }
    }

    if entries.is_empty() {
        return Err(MatrixError::NoBoardsFound.into());
    }

    let mut families_per_id: HashMap<&str, usize> = HashMap::new();
    for (_, identifier) in &entries {
        *families_per_id.entry(identifier.as_str()).or_default() += 1;
    }

    let boards = entries
        .iter()
        .map(|(family, identifier)| {
            let dir_name = if families_per_id[identifier.as_str()] > 1 {
                format!("{}-{}", family, identifier)
            } else {
                identifier.clone()
            };
            Board {
                family: family.clone(),
                identifier: identifier.clone(),
                dir_name,
                options: options.clone(),
            }
        })
        .collect();
    Ok(boards)
}
