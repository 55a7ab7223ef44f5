use chrono::{DateTime, Utc};

use crate::model::{
    FailureCategory, FailureKind, FailurePattern, FlakyTest, TestMetrics, TestResult, TestStatus,
    TestSuite,
};

// Flakiness heuristic
pub const FLAKY_SCORE_THRESHOLD: f64 = 0.3;
pub const RETRY_WEIGHT: f64 = 0.2;
pub const TIMEOUT_BONUS: f64 = 0.3;
pub const NETWORK_BONUS: f64 = 0.2;

/// Slow tests are the slowest 1/20th (5%) of passed tests, rounded up.
pub const SLOW_TEST_DIVISOR: usize = 20;

const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "timed out"];
const NETWORK_KEYWORDS: &[&str] = &["network", "connection", "fetch", "http"];
const ASSERTION_KEYWORDS: &[&str] = &["assertion", "expect", "assert", "should"];
const SETUP_KEYWORDS: &[&str] = &["setup", "beforeeach", "beforeall", "initialization"];

/// Derive a metrics snapshot from parsed suites.
///
/// Pure function of its input: `observed_at` stamps `last_seen` on flaky
/// tests. Every total is taken over the flattened test cases. Suites that
/// only carry attribute counts are reported separately in `virtual_tests`
/// and `virtual_failed_tests` and never mix into the totals.
pub fn compute_metrics(suites: &[TestSuite], observed_at: DateTime<Utc>) -> TestMetrics {
    let tests: Vec<&TestResult> = suites.iter().flat_map(|s| s.tests.iter()).collect();

    let total_tests = tests.len();
    let passed_tests = count_status(&tests, TestStatus::Passed);
    let failed_tests = count_status(&tests, TestStatus::Failed);
    let skipped_tests = count_status(&tests, TestStatus::Skipped);
    let total_duration: f64 = tests.iter().map(|t| t.duration).sum();

    let (virtual_tests, virtual_failed_tests) = suites
        .iter()
        .filter(|s| s.is_virtual())
        .fold((0, 0), |(total, failed), s| {
            (total + s.total_tests, failed + s.failed_tests)
        });

    let pass_rate = if total_tests > 0 {
        passed_tests as f64 / total_tests as f64 * 100.0
    } else {
        0.0
    };
    let average_duration = if total_tests > 0 {
        total_duration / total_tests as f64
    } else {
        0.0
    };

    TestMetrics {
        total_tests,
        passed_tests,
        failed_tests,
        skipped_tests,
        pass_rate,
        total_duration,
        average_duration,
        flaky_tests: identify_flaky_tests(&tests, observed_at),
        slow_tests: identify_slow_tests(&tests),
        failure_categories: categorize_failures(&tests),
        virtual_tests,
        virtual_failed_tests,
    }
}

fn count_status(tests: &[&TestResult], status: TestStatus) -> usize {
    tests.iter().filter(|t| t.status == status).count()
}

// ============================================================================
// Flakiness
// ============================================================================

/// Score in [0, 1]: each retry adds 0.2, timeout and network errors add a
/// bonus.
pub fn flakiness_score(test: &TestResult) -> f64 {
    let mut score = test.retries() as f64 * RETRY_WEIGHT;

    if let Some(message) = &test.error_message {
        let message = message.to_lowercase();
        if message.contains("timeout") {
            score += TIMEOUT_BONUS;
        }
        if message.contains("network") || message.contains("connection") {
            score += NETWORK_BONUS;
        }
    }

    score.min(1.0)
}

pub fn failure_pattern(message: Option<&str>) -> FailurePattern {
    let Some(message) = message else {
        return FailurePattern::Unknown;
    };
    let message = message.to_lowercase();

    if message.contains("timeout") {
        FailurePattern::Timeout
    } else if message.contains("network") || message.contains("connection") {
        FailurePattern::Network
    } else if message.contains("assertion") || message.contains("expect") {
        FailurePattern::Assertion
    } else if message.contains("setup") || message.contains("beforeeach") {
        FailurePattern::Setup
    } else {
        FailurePattern::Other
    }
}

fn identify_flaky_tests(tests: &[&TestResult], observed_at: DateTime<Utc>) -> Vec<FlakyTest> {
    let mut flaky: Vec<FlakyTest> = tests
        .iter()
        .filter(|t| t.retries() > 0)
        .filter_map(|t| {
            let score = flakiness_score(t);
            (score > FLAKY_SCORE_THRESHOLD).then(|| FlakyTest {
                name: t.name.clone(),
                flakiness_score: score,
                failure_pattern: failure_pattern(t.error_message.as_deref()),
                retry_count: t.retries(),
                last_seen: observed_at,
            })
        })
        .collect();

    // Stable: equal scores keep source order.
    flaky.sort_by(|a, b| b.flakiness_score.total_cmp(&a.flakiness_score));
    flaky
}

// ============================================================================
// Slow tests
// ============================================================================

/// Slowest passed tests. Failed and skipped durations reflect early
/// termination, so they are never ranked.
fn identify_slow_tests(tests: &[&TestResult]) -> Vec<TestResult> {
    let mut passed: Vec<TestResult> = tests
        .iter()
        .filter(|t| t.status == TestStatus::Passed)
        .map(|t| (*t).clone())
        .collect();

    passed.sort_by(|a, b| b.duration.total_cmp(&a.duration));
    let keep = passed.len().div_ceil(SLOW_TEST_DIVISOR);
    passed.truncate(keep);
    passed
}

// ============================================================================
// Failure taxonomy
// ============================================================================

/// First matching rule wins: timeout, network, assertion, setup, other.
pub fn categorize_failure(message: &str) -> FailureKind {
    let message = message.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| message.contains(k));

    if has_any(TIMEOUT_KEYWORDS) {
        FailureKind::Timeout
    } else if has_any(NETWORK_KEYWORDS) {
        FailureKind::Network
    } else if has_any(ASSERTION_KEYWORDS) {
        FailureKind::Assertion
    } else if has_any(SETUP_KEYWORDS) {
        FailureKind::Setup
    } else {
        FailureKind::Other
    }
}

fn categorize_failures(tests: &[&TestResult]) -> Vec<FailureCategory> {
    let mut categories: Vec<FailureCategory> = Vec::new();

    for test in tests.iter().filter(|t| t.status == TestStatus::Failed) {
        let Some(message) = test.error_message.as_deref().filter(|m| !m.is_empty()) else {
            continue;
        };
        let kind = categorize_failure(message);

        match categories.iter_mut().find(|c| c.kind == kind) {
            Some(category) => {
                category.count += 1;
                category.tests.push(test.name.clone());
            }
            None => categories.push(FailureCategory {
                kind,
                count: 1,
                percentage: 0.0,
                tests: vec![test.name.clone()],
            }),
        }
    }

    let failed = count_status(tests, TestStatus::Failed);
    for category in &mut categories {
        category.percentage = if failed > 0 {
            category.count as f64 / failed as f64 * 100.0
        } else {
            0.0
        };
    }

    categories.sort_by(|a, b| b.count.cmp(&a.count));
    categories
}
