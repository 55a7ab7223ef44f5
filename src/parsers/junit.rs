use roxmltree::{Document, Node};

use crate::error::ParseError;
use crate::model::{Framework, FrameworkKind, ParsedReport, TestResult, TestStatus, TestSuite};

const UNKNOWN_SUITE: &str = "Unknown Suite";
const UNKNOWN_TEST: &str = "Unknown Test";

/// Surefire re-run markers; each one is a retry of the enclosing test case.
const RERUN_MARKERS: &[&str] = &["flakyFailure", "flakyError", "rerunFailure", "rerunError"];

/// Parse a JUnit XML report.
///
/// Accepts `<testsuites>` wrapping `<testsuite>` elements, a lone
/// `<testsuite>`, or bare `<testcase>` elements under any root. A
/// `<testsuites>` root is read like a suite: direct cases become a suite of
/// their own, and a childless root keeps its attribute counts.
pub fn parse(content: &str) -> Result<ParsedReport, ParseError> {
    let doc = Document::parse(content)?;
    let root = doc.root_element();
    let mut suites = Vec::new();

    match root.tag_name().name() {
        "testsuites" | "testsuite" => collect_suite(root, &mut suites),
        "testcase" => {
            let mut suite = TestSuite::new(UNKNOWN_SUITE);
            push_case(&mut suite, root);
            suite.duration = suite.tests.iter().map(|t| t.duration).sum();
            suites.push(suite);
        }
        other => {
            if children(root, "testcase").next().is_none() {
                return Err(ParseError::MissingRoot(format!(
                    "expected <testsuites>, <testsuite> or <testcase>, found <{}>",
                    other
                )));
            }
            collect_suite(root, &mut suites);
        }
    }

    Ok(ParsedReport::new(suites, Framework::new(FrameworkKind::Junit)))
}

/// Emit `node` as a suite, then any nested `<testsuite>` elements.
///
/// A suite with no test cases of its own becomes a virtual suite carrying its
/// attribute counts, unless it only wraps nested suites (those counts would
/// be counted twice).
fn collect_suite(node: Node<'_, '_>, out: &mut Vec<TestSuite>) {
    let name = attr(node, "name").unwrap_or(UNKNOWN_SUITE);
    let cases: Vec<Node<'_, '_>> = children(node, "testcase").collect();
    let nested: Vec<Node<'_, '_>> = children(node, "testsuite").collect();

    if !cases.is_empty() {
        let mut suite = TestSuite::new(name);
        for case in cases {
            push_case(&mut suite, case);
        }
        suite.duration = match attr(node, "time") {
            Some(_) => time_attr(node, "time"),
            None => suite.tests.iter().map(|t| t.duration).sum(),
        };
        out.push(suite);
    } else if nested.is_empty() {
        let failed = count_attr(node, "failures") + count_attr(node, "errors");
        out.push(TestSuite::from_counts(
            name,
            count_attr(node, "tests"),
            failed,
            count_attr(node, "skipped"),
            time_attr(node, "time"),
        ));
    }

    for child in nested {
        collect_suite(child, out);
    }
}

fn push_case(suite: &mut TestSuite, case: Node<'_, '_>) {
    let status = if has_child(case, "skipped") {
        TestStatus::Skipped
    } else if has_child(case, "failure") || has_child(case, "error") {
        TestStatus::Failed
    } else {
        TestStatus::Passed
    };

    let error = children(case, "failure")
        .chain(children(case, "error"))
        .next()
        .and_then(marker_message);

    let retries = case
        .children()
        .filter(|c| c.is_element() && RERUN_MARKERS.contains(&c.tag_name().name()))
        .count();
    let retries = u32::try_from(retries).unwrap_or(u32::MAX);

    let file = attr(case, "file")
        .or_else(|| attr(case, "classname"))
        .map(str::to_string);

    let mut test = TestResult::new(
        attr(case, "name").unwrap_or(UNKNOWN_TEST),
        status,
        time_attr(case, "time"),
    )
    .with_error(error)
    .with_suite(suite.name.clone())
    .with_file(file);
    if retries > 0 {
        test = test.with_retries(retries);
    }

    suite.push(test);
}

/// `message` attribute of a failure marker, else its text body.
fn marker_message(marker: Node<'_, '_>) -> Option<String> {
    marker
        .attribute("message")
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .or_else(|| marker.text().map(str::trim).filter(|t| !t.is_empty()))
        .map(str::to_string)
}

// ============================================================================
// Attribute access
// ============================================================================

/// Value of `name` on `node`, either as an XML attribute or as the text of a
/// child element with that name. Some generators emit the latter.
fn attr<'a>(node: Node<'a, '_>, name: &'static str) -> Option<&'a str> {
    node.attribute(name)
        .or_else(|| {
            children(node, name)
                .next()
                .and_then(|child| child.text())
        })
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Integer attribute, defaulting to 0 when absent or malformed.
fn count_attr(node: Node<'_, '_>, name: &'static str) -> usize {
    let Some(raw) = attr(node, name) else {
        return 0;
    };
    raw.parse::<usize>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as usize)
        })
        .unwrap_or(0)
}

/// Seconds attribute, defaulting to 0.0. Surefire writes thousands
/// separators ("1,234.5").
fn time_attr(node: Node<'_, '_>, name: &'static str) -> f64 {
    attr(node, name)
        .and_then(|raw| raw.replace(',', "").parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn has_child(node: Node<'_, '_>, name: &'static str) -> bool {
    children(node, name).next().is_some()
}
