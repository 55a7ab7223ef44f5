use clap::Parser;
use std::path::PathBuf;
use tracing::warn;

use crate::parsers::FormatHint;
use crate::pipeline::{PipelineOptions, Verbosity};

/// Test Metrics: normalizes test reports and tracks their health over time.
#[derive(Parser, Debug, Clone)]
#[command(name = "test-metrics", version)]
pub struct CliArgs {
    /// Glob pattern for report files, e.g. "reports/**/*.xml"
    #[arg(short = 'r', long = "reports", env = "TEST_METRICS_REPORTS")]
    pub reports: String,

    /// Report format: auto, junit, jest or playwright
    #[arg(short = 'f', long = "format", default_value = DEFAULT_FORMAT, env = "TEST_METRICS_FORMAT")]
    pub format: String,

    /// Days of history kept in the fast JSON cache
    #[arg(long = "retention-days", default_value_t = DEFAULT_RETENTION_DAYS)]
    pub retention_days: u32,

    /// Days of history kept in the durable store
    #[arg(long = "durable-retention-days", default_value_t = DEFAULT_DURABLE_RETENTION_DAYS)]
    pub durable_retention_days: u32,

    /// Records loaded from the durable store
    #[arg(long = "history-limit", default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub history_limit: usize,

    /// Namespace prefix of the fast cache file
    #[arg(long = "cache-key-prefix", default_value = DEFAULT_CACHE_KEY_PREFIX)]
    pub cache_key_prefix: String,

    /// Directory holding trend history
    #[arg(long = "state-dir", env = "TEST_METRICS_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// CI run identifier
    #[arg(long = "run-id", env = "GITHUB_RUN_ID")]
    pub run_id: Option<String>,

    /// Commit the reports belong to
    #[arg(long = "commit-sha", env = "GITHUB_SHA")]
    pub commit_sha: Option<String>,

    /// CI event that triggered the run
    #[arg(long = "event-name", env = "GITHUB_EVENT_NAME")]
    pub event_name: Option<String>,

    /// Suffix of the durable artifact name, for matrix legs
    #[arg(long = "artifact-suffix")]
    pub artifact_suffix: Option<String>,

    /// Fail when no report could be parsed
    #[arg(long = "require-tests")]
    pub require_tests: bool,

    /// Fail when any test failed
    #[arg(long = "fail-on-failure")]
    pub fail_on_failure: bool,

    /// Annotate pull requests even when every test passed
    #[arg(long = "include-passed")]
    pub include_passed: bool,

    /// Log a preview of every parsed report
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and the final summary
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub struct AnalyzerConfig {
    pub reports: String,
    pub format: FormatHint,
    pub retention_days: u32,
    pub durable_retention_days: u32,
    pub history_limit: usize,
    pub cache_key_prefix: String,
    pub state_dir: PathBuf,
    pub run_id: String,
    pub commit_sha: String,
    pub event_name: Option<String>,
    pub artifact_suffix: Option<String>,
    pub require_tests: bool,
    pub fail_on_failure: bool,
    pub include_passed: bool,
    pub verbosity: Verbosity,
    pub log_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

// Defaults
pub const DEFAULT_FORMAT: &str = "auto";
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_DURABLE_RETENTION_DAYS: u32 = 90;
pub const DEFAULT_HISTORY_LIMIT: usize = 30;
pub const DEFAULT_CACHE_KEY_PREFIX: &str = "test-metrics";
pub const UNKNOWN_COMMIT: &str = "unknown";
pub const STATE_DIR_NAME: &str = "test-metrics";

impl AnalyzerConfig {
    pub fn from_args(args: CliArgs) -> anyhow::Result<Self> {
        let format: FormatHint = args.format.parse()?;

        let state_dir = args.state_dir.unwrap_or_else(default_state_dir);

        let run_id = non_empty(args.run_id).unwrap_or_else(|| {
            let generated = uuid::Uuid::new_v4().to_string();
            warn!("No run id given, using generated id {}", generated);
            generated
        });

        let commit_sha = non_empty(args.commit_sha).unwrap_or_else(|| UNKNOWN_COMMIT.to_string());

        Ok(AnalyzerConfig {
            reports: args.reports,
            format,
            retention_days: args.retention_days,
            durable_retention_days: args.durable_retention_days,
            history_limit: args.history_limit,
            cache_key_prefix: args.cache_key_prefix,
            state_dir,
            run_id,
            commit_sha,
            event_name: non_empty(args.event_name),
            artifact_suffix: non_empty(args.artifact_suffix),
            require_tests: args.require_tests,
            fail_on_failure: args.fail_on_failure,
            include_passed: args.include_passed,
            verbosity: Verbosity::from_flags(args.verbose, args.quiet),
            log_file: args.log_file,
            output: args.output,
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            hint: self.format,
            verbosity: self.verbosity,
        }
    }

    /// Files matching the report pattern, sorted. Directories and
    /// unreadable entries are skipped.
    pub fn report_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = glob::glob(&self.reports)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

fn default_state_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(STATE_DIR_NAME)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
