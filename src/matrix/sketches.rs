//! Sketch discovery and filtering

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use walkdir::WalkDir;

use super::Sketch;
use crate::config::SketchesConfig;
use crate::error::{hints, MatrixError};
use crate::utils::paths::{readable_entry, resolve_against};
use crate::utils::terminal::print_warning;

/// How the set of sketches is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SketchSelection {
    /// Every sketch under the toolchain root, optionally filtered by a pattern
    All { pattern: Option<String> },
    /// One sketch path
    Single(PathBuf),
    /// A file listing one sketch path per line
    ListFile(PathBuf),
    /// The configured default sketch
    Default,
}

/// Compile a user pattern as `.*(pattern).*`, case-insensitive
pub fn compile_pattern(pattern: &str) -> Result<Regex, MatrixError> {
    RegexBuilder::new(&format!("^.*({}).*", pattern))
        .case_insensitive(true)
        .build()
        .map_err(|source| MatrixError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Read exclusion patterns, one per line, blank lines ignored
pub fn load_exclusions(path: &Path) -> Result<Vec<Regex>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read exclusion list {}", path.display()))?;
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(|line| compile_pattern(line).map_err(anyhow::Error::from))
        .collect()
}

/// Remove every candidate matched by any of the patterns
///
/// Each pattern is applied on its own and removes the matching candidates by
/// full path, so applying the same list twice changes nothing.
pub fn apply_exclusions(candidates: &mut Vec<String>, patterns: &[Regex]) {
    for pattern in patterns {
        let matched: HashSet<String> = candidates
            .iter()
            .rev()
            .filter(|candidate| pattern.is_match(candidate))
            .cloned()
            .collect();
        candidates.retain(|candidate| !matched.contains(candidate));
    }
}

/// Resolves a [`SketchSelection`] into an ordered list of sketches
pub struct SketchResolver<'a> {
    root: &'a Path,
    config: &'a SketchesConfig,
}

impl<'a> SketchResolver<'a> {
    pub fn new(root: &'a Path, config: &'a SketchesConfig) -> Self {
        Self { root, config }
    }

    /// Resolve the selection
    ///
    /// `exclude_file` is only consulted in all/pattern mode. When it is `None`
    /// the configured exclusion list is used if it exists.
    pub fn resolve(
        &self,
        selection: &SketchSelection,
        exclude_file: Option<&Path>,
    ) -> Result<Vec<Sketch>> {
        let paths = match selection {
            SketchSelection::All { pattern } => {
                let mut candidates = self.find_all(pattern.as_deref())?;
                let exclusions = match exclude_file {
                    Some(file) => {
                        if !file.is_file() {
                            return Err(MatrixError::config_error_with_hint(
                                format!("Exclude list file does not exist: {}", file.display()),
                                "Pass an existing file to --exclude",
                            )
                            .into());
                        }
                        load_exclusions(file)?
                    }
                    None if self.config.exclude_file.is_file() => {
                        load_exclusions(&self.config.exclude_file)?
                    }
                    None => Vec::new(),
                };
                apply_exclusions(&mut candidates, &exclusions);
                candidates.into_iter().map(PathBuf::from).collect()
            }
            SketchSelection::Single(reference) => vec![self.require(reference)?],
            SketchSelection::ListFile(file) => self.read_list_file(file)?,
            SketchSelection::Default => vec![self.require(&self.config.default)?],
        };

        if paths.is_empty() {
            return Err(MatrixError::EmptySelection.into());
        }
        Ok(paths.into_iter().map(Sketch::new).collect())
    }

    /// Walk the root for sketch files, sorted and deduplicated
    fn find_all(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let filter = pattern.map(compile_pattern).transpose()?;
        let suffix = self.config.suffix.as_str();

        let mut found: Vec<String> = WalkDir::new(self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(readable_entry)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == suffix))
            .filter_map(|e| {
                let path = e.path().to_string_lossy().into_owned();
                match &filter {
                    Some(re) => re.find(&path).map(|m| m.as_str().to_string()),
                    None => Some(path),
                }
            })
            .collect();

        found.sort();
        found.dedup();
        Ok(found)
    }

    /// Resolve a path as given, then against the toolchain root
    fn resolve_reference(&self, reference: &Path) -> Option<PathBuf> {
        let candidate = if reference.exists() {
            reference.to_path_buf()
        } else if reference.is_relative() {
            let joined = resolve_against(self.root, reference);
            if !joined.exists() {
                return None;
            }
            joined
        } else {
            return None;
        };
        Some(candidate.canonicalize().unwrap_or(candidate))
    }

    fn require(&self, reference: &Path) -> Result<PathBuf> {
        self.resolve_reference(reference).ok_or_else(|| {
            MatrixError::UnresolvableReference {
                reference: reference.display().to_string(),
            }
            .into()
        })
    }

    fn read_list_file(&self, file: &Path) -> Result<Vec<PathBuf>> {
        if !file.is_file() {
            return Err(MatrixError::config_error_with_hint(
                format!("Sketches list file does not exist: {}", file.display()),
                hints::unresolvable_sketch(),
            )
            .into());
        }
        let content = fs::read_to_string(file)
            .with_context(|| format!("Failed to read sketches list {}", file.display()))?;

        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.resolve_reference(Path::new(line)) {
                Some(path) => {
                    if seen.insert(path.clone()) {
                        paths.push(path);
                    }
                }
                None => print_warning(&format!("Ignore {} as does not exist.", line)),
            }
        }
        Ok(paths)
    }
}
