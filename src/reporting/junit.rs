//! JUnit XML export of a run summary
//!
//! One `<testsuite>` per sketch and one `<testcase>` per board, so CI services
//! that understand JUnit can show the matrix without extra tooling.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::matrix::{BuildStatus, RunSummary};
use crate::utils::paths::ensure_dir;

/// Export to JUnit XML format
pub fn to_junit_xml(summary: &RunSummary) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuites name=\"sketch-matrix\" tests=\"{}\" failures=\"{}\" errors=\"{}\" time=\"{:.3}\">\n",
        summary.total, summary.failed, summary.errors, summary.duration_secs
    ));

    for report in &summary.sketches {
        let suite_name = report.sketch.display().to_string();
        let suite_time: f64 = report.results.iter().map(|r| r.duration.as_secs_f64()).sum();
        xml.push_str(&format!(
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"0\" time=\"{:.3}\">\n",
            escape_xml(&suite_name),
            report.results.len(),
            report.failed.len(),
            report.errors.len(),
            suite_time
        ));

        for result in &report.results {
            xml.push_str(&format!(
                "    <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\"",
                escape_xml(&result.board),
                escape_xml(&result.sketch),
                result.duration.as_secs_f64()
            ));

            let logs = result
                .logs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            match result.status {
                BuildStatus::Success => {
                    xml.push_str("/>\n");
                }
                BuildStatus::Failure => {
                    xml.push_str(">\n");
                    xml.push_str(&format!(
                        "      <failure message=\"{}\">{}</failure>\n",
                        escape_xml(&result.describe()),
                        escape_xml(&logs)
                    ));
                    xml.push_str("    </testcase>\n");
                }
                BuildStatus::Error => {
                    xml.push_str(">\n");
                    xml.push_str(&format!(
                        "      <error message=\"{}\">{}</error>\n",
                        escape_xml(&result.describe()),
                        escape_xml(&logs)
                    ));
                    xml.push_str("    </testcase>\n");
                }
            }
        }

        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

/// Write the JUnit report to `path`, creating its directory
pub fn write_junit(summary: &RunSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    fs::write(path, to_junit_xml(summary))
        .with_context(|| format!("Failed to write JUnit report {}", path.display()))
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::report::SketchReport;
    use crate::matrix::BuildResult;
    use chrono::Local;
    use std::path::PathBuf;
    use std::time::Duration;

    fn result(board: &str, status: BuildStatus, exit_code: i32) -> BuildResult {
        BuildResult {
            board: board.to_string(),
            sketch: "Blink".to_string(),
            status,
            exit_code: Some(exit_code),
            timed_out: false,
            logs: vec![PathBuf::from(format!("/out/{}/std_folder/Blink.log", board))],
            build_path: PathBuf::from("/tmp/scratch"),
            duration: Duration::from_millis(1500),
            message: None,
        }
    }

    fn summary() -> RunSummary {
        RunSummary {
            started_at: Local::now(),
            output_dir: PathBuf::from("/out"),
            boards: 3,
            sketches: vec![SketchReport {
                sketch: PathBuf::from("/ide/examples/Blink/Blink.ino"),
                passed: vec!["A".to_string()],
                failed: vec!["B<1>".to_string()],
                errors: vec!["C".to_string()],
                results: vec![
                    result("A", BuildStatus::Success, 0),
                    result("B<1>", BuildStatus::Failure, 1),
                    result("C", BuildStatus::Error, 42),
                ],
            }],
            passed: 1,
            failed: 1,
            errors: 1,
            total: 3,
            duration_secs: 4.5,
        }
    }

    #[test]
    fn test_junit_structure() {
        let xml = to_junit_xml(&summary());

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("tests=\"3\" failures=\"1\" errors=\"1\""));
        assert!(xml.contains("<testsuite name=\"/ide/examples/Blink/Blink.ino\""));
        assert!(xml.contains("<testcase name=\"A\" classname=\"Blink\" time=\"1.500\"/>"));
        assert!(xml.contains("<testcase name=\"B&lt;1&gt;\""));
        assert!(xml.contains("<failure message=\"builder exited with code 1\">"));
        assert!(xml.contains("<error message=\"builder exited with code 42\">"));
        assert!(xml.trim_end().ends_with("</testsuites>"));
    }

    #[test]
    fn test_write_junit_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("reports/junit.xml");
        write_junit(&summary(), &path).unwrap();
        assert!(fs::read_to_string(path).unwrap().contains("<testsuites"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
