//! CI service integration
//!
//! Emits service-native annotations for every build that did not succeed,
//! plus the run totals as pipeline variables.

use crate::matrix::RunSummary;

/// CI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CiFormat {
    /// GitHub Actions workflow commands
    GitHubActions,
    /// GitLab CI collapsible sections
    GitLabCI,
    /// Azure DevOps logging commands
    AzureDevOps,
    /// Not running under a known CI service
    #[default]
    Generic,
}

impl CiFormat {
    /// Auto-detect CI environment
    pub fn detect() -> Self {
        Self::detect_with(|key| std::env::var_os(key).is_some())
    }

    fn detect_with(is_set: impl Fn(&str) -> bool) -> Self {
        if is_set("GITHUB_ACTIONS") {
            CiFormat::GitHubActions
        } else if is_set("GITLAB_CI") {
            CiFormat::GitLabCI
        } else if is_set("TF_BUILD") {
            CiFormat::AzureDevOps
        } else {
            CiFormat::Generic
        }
    }
}

/// CI reporter for outputting results in CI-friendly formats
pub struct CiReporter {
    format: CiFormat,
}

impl CiReporter {
    pub fn new(format: CiFormat) -> Self {
        Self { format }
    }

    /// Create a reporter with auto-detected format
    pub fn auto_detect() -> Self {
        Self::new(CiFormat::detect())
    }

    /// Print the annotations for `summary`
    pub fn report(&self, summary: &RunSummary) {
        for line in self.render(summary) {
            println!("{}", line);
        }
    }

    /// Annotation lines for `summary`, empty outside a CI service
    pub fn render(&self, summary: &RunSummary) -> Vec<String> {
        match self.format {
            CiFormat::GitHubActions => render_github(summary),
            CiFormat::GitLabCI => render_gitlab(summary),
            CiFormat::AzureDevOps => render_azure(summary),
            CiFormat::Generic => Vec::new(),
        }
    }
}

fn pass_rate(summary: &RunSummary) -> f64 {
    summary
        .percentages()
        .ok()
        .flatten()
        .map(|pct| pct.passed)
        .unwrap_or_default()
}

fn render_github(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![
        "::group::Build Matrix Results".to_string(),
        "| Metric | Value |".to_string(),
        "|--------|-------|".to_string(),
        format!("| Total | {} |", summary.total),
        format!("| ✅ Passed | {} |", summary.passed),
        format!("| ❌ Failed | {} |", summary.failed),
        format!("| 💥 Errors | {} |", summary.errors),
        format!("| Pass Rate | {:.1}% |", pass_rate(summary)),
        "::endgroup::".to_string(),
    ];

    for (report, result) in summary.unsuccessful() {
        lines.push(format!(
            "::error file={},title=Build {}::{} on {}: {}",
            report.sketch.display(),
            result.status,
            result.sketch,
            result.board,
            result.describe()
        ));
    }

    if !summary.all_passed() {
        lines.push(format!(
            "::error::{} build(s) failed, {} errored",
            summary.failed, summary.errors
        ));
    }
    lines
}

fn render_gitlab(summary: &RunSummary) -> Vec<String> {
    let stamp = summary.started_at.timestamp();
    let mut lines = vec![
        format!(
            "\u{1b}[0Ksection_start:{}:build_matrix[collapsed=true]\r\u{1b}[0KBuild Matrix Results",
            stamp
        ),
        format!("- Total: {}", summary.total),
        format!("- Passed: {}", summary.passed),
        format!("- Failed: {}", summary.failed),
        format!("- Errors: {}", summary.errors),
        format!("- Pass Rate: {:.1}%", pass_rate(summary)),
    ];

    let mut unsuccessful = summary.unsuccessful().peekable();
    if unsuccessful.peek().is_some() {
        lines.push(String::new());
        lines.push("### Failed Builds".to_string());
        for (report, result) in unsuccessful {
            lines.push(format!(
                "- `{}` on `{}`: {}",
                report.sketch.display(),
                result.board,
                result.describe()
            ));
        }
    }

    lines.push(format!(
        "\u{1b}[0Ksection_end:{}:build_matrix\r\u{1b}[0K",
        stamp
    ));
    lines
}

fn render_azure(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![
        format!("##vso[task.setvariable variable=builds_total]{}", summary.total),
        format!("##vso[task.setvariable variable=builds_passed]{}", summary.passed),
        format!("##vso[task.setvariable variable=builds_failed]{}", summary.failed),
        format!("##vso[task.setvariable variable=builds_errors]{}", summary.errors),
        "##[section]Build Matrix Results".to_string(),
    ];

    for (report, result) in summary.unsuccessful() {
        lines.push(format!(
            "##vso[task.logissue type=error;sourcepath={}]{} on {}: {}",
            report.sketch.display(),
            result.sketch,
            result.board,
            result.describe()
        ));
    }

    if !summary.all_passed() {
        lines.push(format!(
            "##vso[task.complete result=Failed;]{} build(s) failed, {} errored",
            summary.failed, summary.errors
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::report::SketchReport;
    use crate::matrix::{BuildResult, BuildStatus};
    use chrono::Local;
    use std::path::PathBuf;
    use std::time::Duration;

    fn summary(failing: bool) -> RunSummary {
        let status = if failing {
            BuildStatus::Failure
        } else {
            BuildStatus::Success
        };
        let result = BuildResult {
            board: "NUCLEO_F411RE".to_string(),
            sketch: "Blink".to_string(),
            status,
            exit_code: Some(if failing { 1 } else { 0 }),
            timed_out: false,
            logs: Vec::new(),
            build_path: PathBuf::from("/tmp/scratch"),
            duration: Duration::from_secs(2),
            message: None,
        };
        RunSummary {
            started_at: Local::now(),
            output_dir: PathBuf::from("/out"),
            boards: 1,
            sketches: vec![SketchReport {
                sketch: PathBuf::from("/ide/Blink/Blink.ino"),
                passed: if failing { vec![] } else { vec!["NUCLEO_F411RE".to_string()] },
                failed: if failing { vec!["NUCLEO_F411RE".to_string()] } else { vec![] },
                errors: vec![],
                results: vec![result],
            }],
            passed: usize::from(!failing),
            failed: usize::from(failing),
            errors: 0,
            total: 1,
            duration_secs: 2.0,
        }
    }

    #[test]
    fn test_detect() {
        assert_eq!(
            CiFormat::detect_with(|k| k == "GITHUB_ACTIONS"),
            CiFormat::GitHubActions
        );
        assert_eq!(CiFormat::detect_with(|k| k == "GITLAB_CI"), CiFormat::GitLabCI);
        assert_eq!(CiFormat::detect_with(|k| k == "TF_BUILD"), CiFormat::AzureDevOps);
        assert_eq!(CiFormat::detect_with(|_| false), CiFormat::Generic);
    }

    #[test]
    fn test_github_annotations() {
        let lines = CiReporter::new(CiFormat::GitHubActions).render(&summary(true));
        assert!(lines.iter().any(|l| l.starts_with(
            "::error file=/ide/Blink/Blink.ino,title=Build FAILED::Blink on NUCLEO_F411RE"
        )));
        assert_eq!(lines.last().unwrap(), "::error::1 build(s) failed, 0 errored");
    }

    #[test]
    fn test_azure_variables() {
        let lines = CiReporter::new(CiFormat::AzureDevOps).render(&summary(false));
        assert!(lines.contains(&"##vso[task.setvariable variable=builds_passed]1".to_string()));
        assert!(!lines.iter().any(|l| l.contains("logissue")));
    }

    #[test]
    fn test_gitlab_sections() {
        let lines = CiReporter::new(CiFormat::GitLabCI).render(&summary(true));
        assert!(lines[0].contains("section_start"));
        assert!(lines.iter().any(|l| l == "### Failed Builds"));
        assert!(lines.last().unwrap().contains("section_end"));
    }

    #[test]
    fn test_generic_renders_nothing() {
        assert!(CiReporter::new(CiFormat::Generic).render(&summary(true)).is_empty());
    }
}
