use serde_json::Value;
use std::collections::HashMap;

use super::{array_field, millis_field, str_field, version_field};
use crate::error::ParseError;
use crate::model::{Framework, FrameworkKind, ParsedReport, TestResult, TestStatus, TestSuite};

const DEFAULT_SUITE: &str = "Default Suite";

/// Parse a Playwright JSON report: either a flat array of results or a
/// nested `suites` tree.
pub fn parse(content: &str) -> Result<ParsedReport, ParseError> {
    let data: Value = serde_json::from_str(content)?;
    parse_value(&data)
}

pub fn parse_value(data: &Value) -> Result<ParsedReport, ParseError> {
    let suites = if let Some(results) = data.as_array() {
        group_flat_results(results)
    } else if let Some(suites) = data.get("suites").and_then(Value::as_array) {
        suites.iter().map(parse_suite).collect()
    } else {
        return Err(ParseError::Shape(
            "expected an array of results or a `suites` array".to_string(),
        ));
    };

    let version = version_field(data).or_else(|| data.get("config").and_then(version_field));
    let framework = Framework {
        kind: FrameworkKind::Playwright,
        version,
    };
    Ok(ParsedReport::new(suites, framework))
}

/// Group flat results by their `suite`/`file`, keeping first-seen order.
fn group_flat_results(results: &[Value]) -> Vec<TestSuite> {
    let mut suites: Vec<TestSuite> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for result in results {
        let suite_name = str_field(result, &["suite", "file"]).unwrap_or(DEFAULT_SUITE);
        let slot = *index.entry(suite_name.to_string()).or_insert_with(|| {
            suites.push(TestSuite::new(suite_name));
            suites.len() - 1
        });

        let suite = &mut suites[slot];
        let test = parse_test(result, suite_name);
        suite.duration += test.duration;
        suite.push(test);
    }
    suites
}

/// Parse one suite, rolling child suites up into it.
fn parse_suite(data: &Value) -> TestSuite {
    let name = str_field(data, &["title", "name"]).unwrap_or("Unknown Suite");
    let mut suite = TestSuite::new(name);
    suite.duration = millis_field(data, "duration");

    for test in array_field(data, "tests") {
        suite.push(parse_test(test, name));
    }

    for spec in array_field(data, "specs") {
        for test in array_field(spec, "tests") {
            suite.push(parse_spec_test(spec, test, name));
        }
    }

    for child in array_field(data, "suites") {
        suite.absorb(parse_suite(child));
    }
    suite
}

fn parse_test(test: &Value, suite: &str) -> TestResult {
    let retry = test
        .get("retry")
        .and_then(Value::as_u64)
        .map_or(0, |r| u32::try_from(r).unwrap_or(u32::MAX));
    let file = str_field(test, &["file"])
        .or_else(|| test.get("location").and_then(|l| str_field(l, &["file"])))
        .map(str::to_string);

    TestResult::new(
        str_field(test, &["title", "name"]).unwrap_or("Unknown Test"),
        map_status(test.get("status").and_then(Value::as_str)),
        millis_field(test, "duration"),
    )
    .with_error(error_message(test))
    .with_retries(retry)
    .with_suite(suite)
    .with_file(file)
}

/// Reporter shape: `spec.tests[].results[]`, one result per attempt. The
/// last attempt decides the outcome.
fn parse_spec_test(spec: &Value, test: &Value, suite: &str) -> TestResult {
    let results = array_field(test, "results");
    let last = results.last();

    let status = last
        .and_then(|r| r.get("status"))
        .or_else(|| test.get("status"))
        .and_then(Value::as_str);
    let retry = last
        .and_then(|r| r.get("retry"))
        .and_then(Value::as_u64)
        .map(|r| u32::try_from(r).unwrap_or(u32::MAX))
        .unwrap_or_else(|| u32::try_from(results.len().saturating_sub(1)).unwrap_or(u32::MAX));

    let file = str_field(spec, &["file"]).map(str::to_string);

    TestResult::new(
        str_field(spec, &["title"]).unwrap_or("Unknown Test"),
        map_status(status),
        last.map(|r| millis_field(r, "duration")).unwrap_or(0.0),
    )
    .with_error(last.and_then(error_message))
    .with_retries(retry)
    .with_suite(suite)
    .with_file(file)
}

fn error_message(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(|e| str_field(e, &["message"]))
        .or_else(|| {
            array_field(value, "errors")
                .first()
                .and_then(|e| str_field(e, &["message"]))
        })
        .or_else(|| str_field(value, &["failure"]))
        .map(str::to_string)
}

/// Case-insensitive status mapping. Unknown statuses fall back to skipped.
pub fn map_status(status: Option<&str>) -> TestStatus {
    match status.map(str::to_ascii_lowercase).as_deref() {
        Some("passed" | "ok") => TestStatus::Passed,
        Some("failed" | "fail" | "error") => TestStatus::Failed,
        Some("skipped" | "skip" | "pending") => TestStatus::Skipped,
        _ => TestStatus::Skipped,
    }
}
