use serde_json::Value;

use super::{array_field, millis_field, str_field, version_field};
use crate::error::ParseError;
use crate::model::{Framework, FrameworkKind, ParsedReport, TestResult, TestStatus, TestSuite};

/// Parse `jest --json` output, or the alternative `{"suites": [...]}` shape.
pub fn parse(content: &str) -> Result<ParsedReport, ParseError> {
    let data: Value = serde_json::from_str(content)?;
    parse_value(&data)
}

pub fn parse_value(data: &Value) -> Result<ParsedReport, ParseError> {
    let suites = if let Some(files) = data.get("testResults").and_then(Value::as_array) {
        files.iter().map(parse_file_result).collect()
    } else if let Some(suites) = data.get("suites").and_then(Value::as_array) {
        suites.iter().map(parse_suite).collect()
    } else {
        return Err(ParseError::Shape(
            "expected a `testResults` or `suites` array".to_string(),
        ));
    };

    let framework = Framework {
        kind: FrameworkKind::Jest,
        version: version_field(data),
    };
    Ok(ParsedReport::new(suites, framework))
}

/// One entry of `testResults`: a test file with its `assertionResults`.
fn parse_file_result(file: &Value) -> TestSuite {
    let name = str_field(file, &["name"]).unwrap_or("Unknown Suite");
    let mut suite = TestSuite::new(name);

    let start = file.get("startTime").and_then(Value::as_f64);
    let end = file.get("endTime").and_then(Value::as_f64);
    if let (Some(start), Some(end)) = (start, end) {
        suite.duration = ((end - start) / 1000.0).max(0.0);
    }

    for assertion in array_field(file, "assertionResults") {
        let test = parse_test(assertion, &["title", "fullName"], name)
            .with_file(Some(name.to_string()));
        suite.push(test);
    }
    suite
}

fn parse_suite(data: &Value) -> TestSuite {
    let name = str_field(data, &["name"]).unwrap_or("Unknown Suite");
    let mut suite = TestSuite::new(name);
    suite.duration = millis_field(data, "duration");

    for test in array_field(data, "tests") {
        suite.push(parse_test(test, &["name", "title"], name));
    }
    suite
}

fn parse_test(test: &Value, name_keys: &[&str], suite: &str) -> TestResult {
    let status = map_status(test.get("status").and_then(Value::as_str));

    let messages: Vec<&str> = array_field(test, "failureMessages")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    let error = (!messages.is_empty()).then(|| messages.join("\n"));

    let mut result = TestResult::new(
        str_field(test, name_keys).unwrap_or("Unknown Test"),
        status,
        millis_field(test, "duration"),
    )
    .with_error(error)
    .with_suite(suite);

    let retries = u32::try_from(array_field(test, "retryReasons").len()).unwrap_or(u32::MAX);
    if retries > 0 {
        result = result.with_retries(retries);
    }
    result
}

/// `passed` and `failed` map directly; every other status (`pending`,
/// `skipped`, `disabled`, `todo`, ...) counts as skipped.
fn map_status(status: Option<&str>) -> TestStatus {
    match status {
        Some("passed") => TestStatus::Passed,
        Some("failed") => TestStatus::Failed,
        _ => TestStatus::Skipped,
    }
}
