pub mod jest;
pub mod junit;
pub mod playwright;

use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ParseError, ReportError};
use crate::model::{FrameworkKind, ParsedReport};

// ============================================================================
// Format selection
// ============================================================================

/// Supported report formats, one parser each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Junit,
    Jest,
    Playwright,
}

impl ReportFormat {
    pub fn framework(&self) -> FrameworkKind {
        match self {
            Self::Junit => FrameworkKind::Junit,
            Self::Jest => FrameworkKind::Jest,
            Self::Playwright => FrameworkKind::Playwright,
        }
    }

    pub fn parse(&self, content: &str) -> Result<ParsedReport, ParseError> {
        match self {
            Self::Junit => junit::parse(content),
            Self::Jest => jest::parse(content),
            Self::Playwright => playwright::parse(content),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "junit" => Ok(Self::Junit),
            "jest" => Ok(Self::Jest),
            "playwright" => Ok(Self::Playwright),
            _ => Err(ReportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Caller's format choice: an explicit format or `auto` detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatHint {
    #[default]
    Auto,
    Explicit(ReportFormat),
}

impl FromStr for FormatHint {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            s.parse().map(Self::Explicit)
        }
    }
}

/// Decide which parser handles `path`. With [`FormatHint::Auto`] the
/// extension decides, and `.json` content is sniffed.
pub fn select_format(
    path: &Path,
    hint: FormatHint,
    content: &str,
) -> Result<ReportFormat, ReportError> {
    if let FormatHint::Explicit(format) = hint {
        return Ok(format);
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xml" => Ok(ReportFormat::Junit),
        "json" => {
            let value: Value =
                serde_json::from_str(content).map_err(|e| ReportError::Parse {
                    path: path.to_path_buf(),
                    source: e.into(),
                })?;
            detect_json_format(&value).ok_or_else(|| ReportError::AmbiguousFormat {
                path: path.to_path_buf(),
            })
        }
        _ => Err(ReportError::UnsupportedExtension {
            path: path.to_path_buf(),
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{}", extension)
            },
        }),
    }
}

/// Sniff a decoded JSON report. `None` when neither runner shape matches.
pub fn detect_json_format(value: &Value) -> Option<ReportFormat> {
    let has = |v: &Value, key: &str| v.get(key).is_some_and(|f| !f.is_null());

    if has(value, "testResults") {
        return Some(ReportFormat::Jest);
    }
    if let Some(suites) = value.get("suites").and_then(Value::as_array) {
        if suites.iter().all(|s| has(s, "testResults")) {
            return Some(ReportFormat::Jest);
        }
        return Some(ReportFormat::Playwright);
    }
    if value.is_array() {
        return Some(ReportFormat::Playwright);
    }
    None
}

// ============================================================================
// Entry points
// ============================================================================

pub fn read_text(path: &Path) -> Result<String, ReportError> {
    std::fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Select a parser for already-read `content` and run it.
pub fn parse_content(
    path: &Path,
    hint: FormatHint,
    content: &str,
) -> Result<ParsedReport, ReportError> {
    let format = select_format(path, hint, content)?;
    format.parse(content).map_err(|source| ReportError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_file(path: &Path, hint: FormatHint) -> Result<ParsedReport, ReportError> {
    let content = read_text(path)?;
    parse_content(path, hint, &content)
}

// ============================================================================
// JSON field helpers shared by the JSON runners
// ============================================================================

/// First non-empty string among `keys`.
pub(crate) fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// Millisecond field converted to seconds; missing or non-numeric is 0.
pub(crate) fn millis_field(value: &Value, key: &str) -> f64 {
    value
        .get(key)
        .and_then(Value::as_f64)
        .map(|ms| (ms / 1000.0).max(0.0))
        .unwrap_or(0.0)
}

pub(crate) fn version_field(value: &Value) -> Option<String> {
    match value.get("version") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
