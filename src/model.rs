use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Parsed report model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// One executed test case. Durations are always seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl TestResult {
    pub fn new(name: impl Into<String>, status: TestStatus, duration: f64) -> Self {
        Self {
            name: name.into(),
            status,
            duration: duration.max(0.0),
            error_message: None,
            retry_count: None,
            suite: None,
            file: None,
        }
    }

    pub fn with_error(mut self, message: Option<String>) -> Self {
        self.error_message = message.filter(|m| !m.is_empty());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry_count = Some(retries);
        self
    }

    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn retries(&self) -> u32 {
        self.retry_count.unwrap_or(0)
    }
}

/// A named group of tests with precomputed counters.
///
/// Counters track `tests` as long as tests are added through [`TestSuite::push`].
/// Suites built with [`TestSuite::from_counts`] carry only aggregate counters
/// and an empty `tests` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub name: String,
    pub tests: Vec<TestResult>,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub duration: f64,
}

impl TestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
            total_tests: 0,
            passed_tests: 0,
            failed_tests: 0,
            skipped_tests: 0,
            duration: 0.0,
        }
    }

    /// Suite with aggregate counters only. `failed` already includes errors.
    pub fn from_counts(
        name: impl Into<String>,
        total: usize,
        failed: usize,
        skipped: usize,
        duration: f64,
    ) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
            total_tests: total,
            passed_tests: total.saturating_sub(failed).saturating_sub(skipped),
            failed_tests: failed,
            skipped_tests: skipped,
            duration: duration.max(0.0),
        }
    }

    /// Append a test and bump the matching counter. Does not touch `duration`.
    pub fn push(&mut self, test: TestResult) {
        self.total_tests += 1;
        match test.status {
            TestStatus::Passed => self.passed_tests += 1,
            TestStatus::Failed => self.failed_tests += 1,
            TestStatus::Skipped => self.skipped_tests += 1,
        }
        self.tests.push(test);
    }

    /// Fold a child suite's tests and counters into this one.
    pub fn absorb(&mut self, child: TestSuite) {
        self.total_tests += child.total_tests;
        self.passed_tests += child.passed_tests;
        self.failed_tests += child.failed_tests;
        self.skipped_tests += child.skipped_tests;
        self.duration += child.duration;
        self.tests.extend(child.tests);
    }

    /// True when the suite only carries attribute-level counters.
    pub fn is_virtual(&self) -> bool {
        self.tests.is_empty() && self.total_tests > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkKind {
    Jest,
    Playwright,
    Junit,
}

impl FrameworkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jest => "jest",
            Self::Playwright => "playwright",
            Self::Junit => "junit",
        }
    }
}

impl std::fmt::Display for FrameworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Framework {
    #[serde(rename = "type")]
    pub kind: FrameworkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Framework {
    pub fn new(kind: FrameworkKind) -> Self {
        Self {
            kind,
            version: None,
        }
    }
}

/// Output of a format parser. `timestamp` is when the report was parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReport {
    pub suites: Vec<TestSuite>,
    pub framework: Framework,
    pub timestamp: DateTime<Utc>,
}

impl ParsedReport {
    pub fn new(suites: Vec<TestSuite>, framework: Framework) -> Self {
        Self {
            suites,
            framework,
            timestamp: Utc::now(),
        }
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }
}

// ============================================================================
// Metrics model
// ============================================================================

/// Heuristic cause of a flaky test's failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePattern {
    Timeout,
    Network,
    Assertion,
    Setup,
    Other,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakyTest {
    pub name: String,
    pub flakiness_score: f64,
    pub failure_pattern: FailurePattern,
    pub retry_count: u32,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Timeout,
    Assertion,
    Setup,
    Network,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Assertion => "assertion",
            Self::Setup => "setup",
            Self::Network => "network",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureCategory {
    #[serde(rename = "type")]
    pub kind: FailureKind,
    pub count: usize,
    pub percentage: f64,
    pub tests: Vec<String>,
}

/// One fully derived metrics snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetrics {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub pass_rate: f64,
    pub total_duration: f64,
    pub average_duration: f64,
    #[serde(default)]
    pub flaky_tests: Vec<FlakyTest>,
    #[serde(default)]
    pub slow_tests: Vec<TestResult>,
    #[serde(default)]
    pub failure_categories: Vec<FailureCategory>,
    /// Tests known only from suite-level counters, not part of the totals.
    #[serde(default)]
    pub virtual_tests: usize,
    #[serde(default)]
    pub virtual_failed_tests: usize,
}

// ============================================================================
// Trend model
// ============================================================================

/// One historical record. Identity is `(run_id, matrix_key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendData {
    pub timestamp: DateTime<Utc>,
    pub commit_sha: String,
    pub metrics: TestMetrics,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_key: Option<String>,
}

impl TrendData {
    pub fn key(&self) -> (&str, Option<&str>) {
        (self.run_id.as_str(), self.matrix_key.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Declining => write!(f, "declining"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTrend {
    pub current: f64,
    pub previous: f64,
    pub change: f64,
    pub change_percent: f64,
    pub trend: Trend,
}

impl PerformanceTrend {
    /// Trend for a metric with nothing to compare against.
    pub fn baseline(current: f64) -> Self {
        Self {
            current,
            previous: 0.0,
            change: 0.0,
            change_percent: 0.0,
            trend: Trend::Stable,
        }
    }
}
