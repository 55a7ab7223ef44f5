use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::model::{Framework, TestMetrics};
use crate::pipeline::Analysis;

pub const GREEN_PASS_RATE: f64 = 95.0;
pub const YELLOW_PASS_RATE: f64 = 80.0;

/// Only pull-request runs are annotated.
pub const PULL_REQUEST_EVENT: &str = "pull_request";

// ============================================================================
// Status summary
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Green,
    Yellow,
    Red,
}

impl StatusLevel {
    pub fn from_pass_rate(pass_rate: f64) -> Self {
        if pass_rate >= GREEN_PASS_RATE {
            Self::Green
        } else if pass_rate >= YELLOW_PASS_RATE {
            Self::Yellow
        } else {
            Self::Red
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Green => "All tests passed",
            Self::Yellow => "Some tests failed",
            Self::Red => "Tests failing",
        }
    }
}

/// Short status for a pull-request annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub level: StatusLevel,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub pass_rate: f64,
    pub total_duration: f64,
    pub flaky_tests: usize,
}

impl StatusSummary {
    pub fn from_metrics(metrics: &TestMetrics) -> Self {
        Self {
            level: StatusLevel::from_pass_rate(metrics.pass_rate),
            total_tests: metrics.total_tests,
            passed_tests: metrics.passed_tests,
            failed_tests: metrics.failed_tests,
            skipped_tests: metrics.skipped_tests,
            pass_rate: metrics.pass_rate,
            total_duration: metrics.total_duration,
            flaky_tests: metrics.flaky_tests.len(),
        }
    }
}

impl std::fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}/{} passed ({:.1}%), {} failed, {} skipped, {} flaky, {:.1}s",
            self.level.label(),
            self.passed_tests,
            self.total_tests,
            self.pass_rate,
            self.failed_tests,
            self.skipped_tests,
            self.flaky_tests,
            self.total_duration
        )
    }
}

/// Whether a status annotation should be posted for this run.
pub fn should_annotate(metrics: &TestMetrics, include_passed: bool, event_name: Option<&str>) -> bool {
    event_name == Some(PULL_REQUEST_EVENT) && (metrics.failed_tests > 0 || include_passed)
}

// ============================================================================
// Structured report
// ============================================================================

/// Document handed to the publish sink.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub framework: Framework,
    pub run_id: String,
    pub commit_sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_key: Option<String>,
    pub files_parsed: usize,
    pub files_failed: usize,
    pub status: StatusSummary,
    #[serde(flatten)]
    pub analysis: Analysis,
}

pub fn write_report<W: Write>(mut writer: W, report: &AnalysisReport) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pass_rate: f64, failed: usize) -> TestMetrics {
        TestMetrics {
            total_tests: 10,
            passed_tests: 10 - failed,
            failed_tests: failed,
            pass_rate,
            ..TestMetrics::default()
        }
    }

    #[test]
    fn test_status_levels() {
        assert_eq!(StatusLevel::from_pass_rate(100.0), StatusLevel::Green);
        assert_eq!(StatusLevel::from_pass_rate(95.0), StatusLevel::Green);
        assert_eq!(StatusLevel::from_pass_rate(94.9), StatusLevel::Yellow);
        assert_eq!(StatusLevel::from_pass_rate(80.0), StatusLevel::Yellow);
        assert_eq!(StatusLevel::from_pass_rate(0.0), StatusLevel::Red);
    }

    #[test]
    fn test_annotation_gating() {
        let failing = metrics(90.0, 1);
        let passing = metrics(100.0, 0);

        assert!(should_annotate(&failing, false, Some("pull_request")));
        assert!(!should_annotate(&failing, false, Some("push")));
        assert!(!should_annotate(&failing, true, None));
        assert!(!should_annotate(&passing, false, Some("pull_request")));
        assert!(should_annotate(&passing, true, Some("pull_request")));
    }

    #[test]
    fn test_summary_line_is_plain_text() {
        let line = StatusSummary::from_metrics(&metrics(90.0, 1)).to_string();
        assert_eq!(
            line,
            "Some tests failed: 9/10 passed (90.0%), 1 failed, 0 skipped, 0 flaky, 0.0s"
        );
    }
}
