use chrono::Utc;
use serde_json::Value;
use test_metrics::metrics::compute_metrics;
use test_metrics::model::{Framework, FrameworkKind, ParsedReport, TestResult, TestStatus, TestSuite};
use test_metrics::pipeline::analyze;
use test_metrics::publish::{write_report, AnalysisReport, StatusLevel, StatusSummary};

fn report() -> ParsedReport {
    let mut suite = TestSuite::new("api");
    suite.push(TestResult::new("lists users", TestStatus::Passed, 0.4));
    suite.push(
        TestResult::new("creates user", TestStatus::Failed, 2.0)
            .with_error(Some("expect(status).toBe(201)".to_string())),
    );
    ParsedReport::new(vec![suite], Framework::new(FrameworkKind::Jest))
}

#[test]
fn test_report_json_is_plain_structured_data() {
    let parsed = report();
    let now = Utc::now();
    let analysis = analyze(&parsed, &[], now);
    let status = StatusSummary::from_metrics(&analysis.metrics);
    assert_eq!(status.level, StatusLevel::Red);

    let report = AnalysisReport {
        generated_at: now,
        framework: parsed.framework.clone(),
        run_id: "12".to_string(),
        commit_sha: "abc".to_string(),
        matrix_key: None,
        files_parsed: 1,
        files_failed: 0,
        status,
        analysis,
    };

    let mut out = Vec::new();
    write_report(&mut out, &report).unwrap();
    let json: Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(json["framework"]["type"], "jest");
    assert_eq!(json["runId"], "12");
    assert!(json.get("matrixKey").is_none());
    assert_eq!(json["status"]["level"], "red");
    assert_eq!(json["metrics"]["totalTests"], 2);
    assert_eq!(json["metrics"]["passRate"], 50.0);
    assert_eq!(json["metrics"]["failureCategories"][0]["type"], "assertion");
    assert_eq!(json["trends"]["durationTrend"]["trend"], "stable");
    assert_eq!(json["stats"]["records"], 0);
    assert!(json["insights"].is_array());
}

#[test]
fn test_status_summary_counts() {
    let metrics = compute_metrics(&report().suites, Utc::now());
    let summary = StatusSummary::from_metrics(&metrics);
    assert_eq!(summary.total_tests, 2);
    assert_eq!(summary.failed_tests, 1);
    assert_eq!(summary.flaky_tests, 0);
    assert!(summary.to_string().starts_with("Tests failing: 1/2 passed (50.0%)"));
}
