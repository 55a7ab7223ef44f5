use chrono::Utc;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use test_metrics::error::{ParseError, ReportError};
use test_metrics::metrics::compute_metrics;
use test_metrics::model::{FrameworkKind, TestStatus};
use test_metrics::parsers::{parse_file, FormatHint, ReportFormat};

const EIGHT_CASES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="com.example.CartTest" tests="8" failures="1" errors="0" skipped="1" time="4.5">
    <testcase name="adds item" classname="com.example.CartTest" time="0.5"/>
    <testcase name="removes item" classname="com.example.CartTest" time="0.5"/>
    <testcase name="empties cart" classname="com.example.CartTest" time="0.5"/>
    <testcase name="applies coupon" classname="com.example.CartTest" time="0.5"/>
    <testcase name="computes tax" classname="com.example.CartTest" time="0.5"/>
    <testcase name="computes total" classname="com.example.CartTest" time="1.0"/>
    <testcase name="rejects bad coupon" classname="com.example.CartTest" time="1.0">
      <failure message="expected 10 but was 12">AssertionError</failure>
    </testcase>
    <testcase name="ships abroad" classname="com.example.CartTest" time="0">
      <skipped/>
    </testcase>
  </testsuite>
</testsuites>"#;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_junit_file_to_metrics() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "results.xml", EIGHT_CASES);

    let report = parse_file(&path, FormatHint::Auto).unwrap();
    assert_eq!(report.framework.kind, FrameworkKind::Junit);
    assert_eq!(report.suites.len(), 1);
    let suite = &report.suites[0];
    assert_eq!(suite.total_tests, suite.tests.len());
    assert_eq!(suite.duration, 4.5);
    assert_eq!(suite.tests[6].status, TestStatus::Failed);
    assert_eq!(
        suite.tests[6].error_message.as_deref(),
        Some("expected 10 but was 12")
    );
    assert_eq!(suite.tests[0].file.as_deref(), Some("com.example.CartTest"));

    let metrics = compute_metrics(&report.suites, Utc::now());
    assert_eq!(metrics.total_tests, 8);
    assert_eq!(metrics.failed_tests, 1);
    assert_eq!(metrics.skipped_tests, 1);
    assert_eq!(metrics.passed_tests, 6);
    assert_eq!(metrics.pass_rate, 75.0);
}

#[test]
fn test_junit_counts_only_suite_is_virtual() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "summary.xml",
        r#"<testsuite name="api" tests="10" failures="2" errors="1" skipped="3" time="12.5"/>"#,
    );

    let report = parse_file(&path, FormatHint::Auto).unwrap();
    let suite = &report.suites[0];
    assert!(suite.tests.is_empty());
    assert_eq!(suite.total_tests, 10);
    assert_eq!(suite.failed_tests, 3);
    assert_eq!(suite.passed_tests, 4);

    let metrics = compute_metrics(&report.suites, Utc::now());
    assert_eq!(metrics.total_tests, 0);
    assert_eq!(metrics.pass_rate, 0.0);
    assert_eq!(metrics.virtual_tests, 10);
    assert_eq!(metrics.virtual_failed_tests, 3);
    assert!(metrics.slow_tests.is_empty());
}

#[test]
fn test_jest_report_detected_from_content() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "jest-results.json",
        r#"{
            "numTotalTests": 2,
            "testResults": [{
                "name": "/app/math.test.js",
                "startTime": 0,
                "endTime": 1200,
                "assertionResults": [
                    {"title": "adds", "status": "passed", "duration": 5},
                    {"title": "flakes", "status": "passed", "duration": 900,
                     "retryReasons": ["Timeout", "Timeout"]}
                ]
            }]
        }"#,
    );

    let report = parse_file(&path, FormatHint::Auto).unwrap();
    assert_eq!(report.framework.kind, FrameworkKind::Jest);
    assert_eq!(report.suites[0].duration, 1.2);
    assert_eq!(report.suites[0].tests[1].retry_count, Some(2));
}

#[test]
fn test_playwright_report_detected_from_content() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "playwright.json",
        r#"{
            "config": {"version": "1.40.0"},
            "suites": [{
                "title": "login.spec.ts",
                "specs": [{
                    "title": "logs in",
                    "file": "login.spec.ts",
                    "tests": [{"results": [
                        {"status": "failed", "duration": 3000, "retry": 0,
                         "error": {"message": "net::ERR_CONNECTION_REFUSED"}},
                        {"status": "passed", "duration": 1500, "retry": 1}
                    ]}]
                }],
                "suites": [{
                    "title": "nested",
                    "tests": [{"title": "logs out", "status": "skipped"}]
                }]
            }]
        }"#,
    );

    let report = parse_file(&path, FormatHint::Auto).unwrap();
    assert_eq!(report.framework.kind, FrameworkKind::Playwright);
    assert_eq!(report.framework.version.as_deref(), Some("1.40.0"));

    let suite = &report.suites[0];
    assert_eq!(suite.total_tests, 2);
    assert_eq!(suite.passed_tests, 1);
    assert_eq!(suite.skipped_tests, 1);
    assert_eq!(suite.tests[0].retry_count, Some(1));
    assert_eq!(suite.tests[0].duration, 1.5);
}

#[test]
fn test_ambiguous_json_asks_for_manual_format() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "mystery.json", r#"{"results": []}"#);

    let err = parse_file(&path, FormatHint::Auto).unwrap_err();
    assert!(matches!(err, ReportError::AmbiguousFormat { .. }));
    assert!(err.to_string().contains("specify the report format manually"));
    assert_eq!(err.path(), Some(path.as_path()));
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "results.txt", "PASS all");

    let err = parse_file(&path, FormatHint::Auto).unwrap_err();
    match err {
        ReportError::UnsupportedExtension { extension, .. } => assert_eq!(extension, ".txt"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_explicit_format_overrides_extension() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "junit.out", EIGHT_CASES);

    let report = parse_file(&path, FormatHint::Explicit(ReportFormat::Junit)).unwrap();
    assert_eq!(report.test_count(), 8);
}

#[test]
fn test_malformed_xml_reports_path_and_cause() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.xml", "<testsuite><testcase name=\"a\">");

    let err = parse_file(&path, FormatHint::Auto).unwrap_err();
    match &err {
        ReportError::Parse { path: p, source } => {
            assert_eq!(p, &path);
            assert!(matches!(source, ParseError::Xml(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("broken.xml"));
}

#[test]
fn test_xml_without_known_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "pom.xml", "<project><name>x</name></project>");

    let err = parse_file(&path, FormatHint::Auto).unwrap_err();
    assert!(matches!(
        err,
        ReportError::Parse {
            source: ParseError::MissingRoot(_),
            ..
        }
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = parse_file(Path::new("/nonexistent/report.xml"), FormatHint::Auto).unwrap_err();
    assert!(matches!(err, ReportError::Io { .. }));
}
