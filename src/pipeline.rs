use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::ReportError;
use crate::metrics::calculator::compute_metrics;
use crate::metrics::trends::{performance_insights, trend_stats, trend_summary};
use crate::metrics::{TrendStats, TrendSummary};
use crate::model::{ParsedReport, TestMetrics, TrendData};
use crate::parsers::{parse_file, FormatHint};

/// Number of tests shown per suite in debug previews.
const PREVIEW_TESTS: usize = 3;

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Only warnings and the final summary.
    Quiet,
    #[default]
    Normal,
    /// Adds a preview of every parsed report.
    Debug,
}

impl Verbosity {
    /// `-q` wins over any number of `-v`.
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose > 0 {
            Self::Debug
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub hint: FormatHint,
    pub verbosity: Verbosity,
}

// ============================================================================
// Batch parsing
// ============================================================================

/// Outcome of parsing a batch. `reports` keeps input order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub reports: Vec<(PathBuf, ParsedReport)>,
    pub failures: Vec<ReportError>,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    fn collect(outcomes: Vec<(PathBuf, Result<ParsedReport, ReportError>)>, opts: &PipelineOptions) -> Self {
        let mut batch = Self::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(report) => {
                    log_parsed(&path, &report, opts.verbosity);
                    batch.reports.push((path, report));
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    batch.failures.push(e);
                }
            }
        }
        batch
    }
}

/// Parse every path in order. A failing file is logged and skipped.
pub fn parse_batch(paths: &[PathBuf], opts: &PipelineOptions) -> BatchResult {
    let outcomes = paths
        .iter()
        .map(|path| (path.clone(), parse_file(path, opts.hint)))
        .collect();
    BatchResult::collect(outcomes, opts)
}

/// Same as [`parse_batch`], with each file parsed on a blocking task.
/// Results are gathered only after every task finished.
pub async fn parse_batch_concurrent(paths: &[PathBuf], opts: &PipelineOptions) -> BatchResult {
    let hint = opts.hint;
    let tasks = paths.iter().cloned().map(|path| {
        tokio::task::spawn_blocking(move || {
            let outcome = parse_file(&path, hint);
            (path, outcome)
        })
    });

    let outcomes = join_all(tasks)
        .await
        .into_iter()
        .zip(paths)
        .map(|(joined, path)| match joined {
            Ok(outcome) => outcome,
            Err(e) => (
                path.clone(),
                Err(ReportError::Io {
                    path: path.clone(),
                    source: std::io::Error::other(e.to_string()),
                }),
            ),
        })
        .collect();

    BatchResult::collect(outcomes, opts)
}

fn log_parsed(path: &Path, report: &ParsedReport, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        info!(
            "Parsed {} ({}): {} suites, {} tests",
            path.display(),
            report.framework.kind,
            report.suites.len(),
            report.test_count()
        );
    }
    if verbosity == Verbosity::Debug {
        for suite in &report.suites {
            let preview: Vec<String> = suite
                .tests
                .iter()
                .take(PREVIEW_TESTS)
                .map(|t| format!("{} [{:?}, {:.3}s]", t.name, t.status, t.duration))
                .collect();
            debug!(
                "  suite '{}': total={} passed={} failed={} skipped={} duration={:.3}s tests={:?}",
                suite.name,
                suite.total_tests,
                suite.passed_tests,
                suite.failed_tests,
                suite.skipped_tests,
                suite.duration,
                preview
            );
        }
    }
}

/// Concatenate reports into one, preserving order. Framework and timestamp
/// come from the last report. `None` when there is nothing to combine.
pub fn combine<I>(reports: I) -> Option<ParsedReport>
where
    I: IntoIterator<Item = ParsedReport>,
{
    reports.into_iter().reduce(|mut combined, next| {
        combined.suites.extend(next.suites);
        combined.framework = next.framework;
        combined.timestamp = next.timestamp;
        combined
    })
}

// ============================================================================
// Analysis
// ============================================================================

/// Everything derived from one combined report and its history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub metrics: TestMetrics,
    pub trends: TrendSummary,
    pub insights: Vec<String>,
    pub stats: TrendStats,
}

/// Compute metrics for `report` and compare them against `history`.
pub fn analyze(report: &ParsedReport, history: &[TrendData], observed_at: DateTime<Utc>) -> Analysis {
    let metrics = compute_metrics(&report.suites, observed_at);
    let trends = trend_summary(&metrics, history);
    let insights = performance_insights(&metrics, &trends);
    let stats = trend_stats(history);

    info!(
        "Analyzed {} tests: {:.1}% passed, {} flaky, {} slow",
        metrics.total_tests,
        metrics.pass_rate,
        metrics.flaky_tests.len(),
        metrics.slow_tests.len()
    );

    Analysis {
        metrics,
        trends,
        insights,
        stats,
    }
}

/// History record for a finished analysis.
pub fn snapshot(
    metrics: &TestMetrics,
    run_id: &str,
    commit_sha: &str,
    matrix_key: Option<String>,
    timestamp: DateTime<Utc>,
) -> TrendData {
    TrendData {
        timestamp,
        commit_sha: commit_sha.to_string(),
        metrics: metrics.clone(),
        run_id: run_id.to_string(),
        matrix_key,
    }
}
