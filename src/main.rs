use chrono::Utc;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use test_metrics::config::{AnalyzerConfig, CliArgs};
use test_metrics::history::cache::JsonTrendCache;
use test_metrics::history::db::{artifact_name, SqliteTrendStore};
use test_metrics::history::{load_history, merge_histories, DurableStore, FastStore};
use test_metrics::matrix::matrix_key_from_env;
use test_metrics::model::TrendData;
use test_metrics::pipeline::{self, Verbosity};
use test_metrics::publish::{self, AnalysisReport, StatusSummary};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = CliArgs::parse();
    let verbosity = Verbosity::from_flags(args.verbose, args.quiet);
    let _log_guard = init_tracing(verbosity, args.log_file.as_deref())?;

    info!("Starting test-metrics v{}", env!("CARGO_PKG_VERSION"));
    let config = AnalyzerConfig::from_args(args)?;
    info!("Report pattern: {}", config.reports);
    info!("State dir: {:?}", config.state_dir);

    run(&config).await
}

/// Console logging to stderr plus an optional plain-text log file. The
/// returned guard flushes the file writer on drop.
fn init_tracing(verbosity: Verbosity, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let default_filter = match verbosity {
        Verbosity::Quiet => "test_metrics=warn",
        Verbosity::Normal => "test_metrics=info",
        Verbosity::Debug => "test_metrics=debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Log file path has no file name: {:?}", path))?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Nothing to analyze: fatal only with `--require-tests`.
fn nothing_to_analyze(config: &AnalyzerConfig, message: &str) -> ExitCode {
    if config.require_tests {
        error!("{}", message);
        ExitCode::FAILURE
    } else {
        warn!("{}", message);
        ExitCode::SUCCESS
    }
}

async fn run(config: &AnalyzerConfig) -> anyhow::Result<ExitCode> {
    let paths = config.report_paths()?;
    if paths.is_empty() {
        let message = format!("No test result files found matching pattern: {}", config.reports);
        return Ok(nothing_to_analyze(config, &message));
    }
    info!("Found {} test result files", paths.len());

    let batch = pipeline::parse_batch_concurrent(&paths, &config.pipeline_options()).await;
    let files_failed = batch.failures.len();
    let files_parsed = batch.reports.len();

    let Some(combined) = pipeline::combine(batch.reports.into_iter().map(|(_, report)| report)) else {
        return Ok(nothing_to_analyze(config, "No test results could be parsed"));
    };

    // History
    let now = Utc::now();
    let cache = JsonTrendCache::new(&config.state_dir, &config.cache_key_prefix, config.retention_days);
    let artifact = artifact_name(combined.framework.kind, config.artifact_suffix.as_deref());
    let durable = match SqliteTrendStore::new(&config.state_dir, artifact, config.durable_retention_days) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("Durable trend store unavailable: {}", e);
            None
        }
    };

    let history = match &durable {
        Some(store) => load_history(&cache, store, config.history_limit),
        None => {
            let cached = cache.load().unwrap_or_else(|e| {
                warn!("Failed to load cached trend data: {}", e);
                Vec::new()
            });
            merge_histories(&cached, &[])
        }
    };

    let analysis = pipeline::analyze(&combined, &history, now);
    for insight in &analysis.insights {
        info!("{}", insight);
    }

    let matrix_key = matrix_key_from_env();
    let snapshot = pipeline::snapshot(
        &analysis.metrics,
        &config.run_id,
        &config.commit_sha,
        matrix_key.clone(),
        now,
    );

    let status = StatusSummary::from_metrics(&analysis.metrics);
    let report = AnalysisReport {
        generated_at: now,
        framework: combined.framework.clone(),
        run_id: config.run_id.clone(),
        commit_sha: config.commit_sha.clone(),
        matrix_key,
        files_parsed,
        files_failed,
        status: status.clone(),
        analysis,
    };

    match &config.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            publish::write_report(std::fs::File::create(path)?, &report)?;
            info!("Wrote report to {:?}", path);
        }
        None => publish::write_report(std::io::stdout().lock(), &report)?,
    }

    persist(&cache, durable.as_ref(), snapshot, now);

    if publish::should_annotate(&report.analysis.metrics, config.include_passed, config.event_name.as_deref()) {
        info!("PR status: {}", status);
    }

    let failed = report.analysis.metrics.failed_tests;
    if failed > 0 {
        if config.fail_on_failure {
            error!("{} test(s) failed", failed);
            return Ok(ExitCode::FAILURE);
        }
        warn!("{} test(s) failed", failed);
    }

    info!("Test metrics analysis completed successfully");
    Ok(ExitCode::SUCCESS)
}

/// Save the finished snapshot to both stores. Store failures are logged.
fn persist(cache: &JsonTrendCache, durable: Option<&SqliteTrendStore>, snapshot: TrendData, now: chrono::DateTime<Utc>) {
    if let Some(store) = durable {
        match store.save(&snapshot) {
            Ok(()) => info!("Saved trend record to {}", store.artifact_name()),
            Err(e) => warn!("Failed to save durable trend record: {}", e),
        }
    }
    if let Err(e) = cache.record(snapshot, now) {
        warn!("Failed to save cached trend data: {}", e);
    }
}
