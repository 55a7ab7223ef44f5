use serde::Serialize;

use crate::model::{PerformanceTrend, TestMetrics, Trend, TrendData};

// Duration thresholds are asymmetric: regressions are flagged sooner.
pub const DURATION_IMPROVING_PERCENT: f64 = -5.0;
pub const DURATION_DECLINING_PERCENT: f64 = 10.0;
/// Symmetric band for every other metric.
pub const STABLE_BAND_PERCENT: f64 = 5.0;

/// Which metric a comparison is about. Decides the direction of
/// "improving" and the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMetric {
    Duration,
    PassRate,
    TestCount,
    FlakyCount,
}

impl TrendMetric {
    pub fn value(&self, metrics: &TestMetrics) -> f64 {
        match self {
            Self::Duration => metrics.total_duration,
            Self::PassRate => metrics.pass_rate,
            Self::TestCount => metrics.total_tests as f64,
            Self::FlakyCount => metrics.flaky_tests.len() as f64,
        }
    }

    fn classify_percent(&self, change_percent: f64) -> Trend {
        match self {
            Self::Duration => {
                if change_percent < DURATION_IMPROVING_PERCENT {
                    Trend::Improving
                } else if change_percent > DURATION_DECLINING_PERCENT {
                    Trend::Declining
                } else {
                    Trend::Stable
                }
            }
            Self::FlakyCount => {
                if change_percent < -STABLE_BAND_PERCENT {
                    Trend::Improving
                } else if change_percent > STABLE_BAND_PERCENT {
                    Trend::Declining
                } else {
                    Trend::Stable
                }
            }
            Self::PassRate | Self::TestCount => {
                if change_percent > STABLE_BAND_PERCENT {
                    Trend::Improving
                } else if change_percent < -STABLE_BAND_PERCENT {
                    Trend::Declining
                } else {
                    Trend::Stable
                }
            }
        }
    }
}

/// Compare two values of `metric`. `change_percent` is 0 when there is no
/// positive previous value to divide by.
pub fn classify(current: f64, previous: f64, metric: TrendMetric) -> PerformanceTrend {
    let change = current - previous;
    let change_percent = if previous > 0.0 {
        change / previous * 100.0
    } else {
        0.0
    };

    PerformanceTrend {
        current,
        previous,
        change,
        change_percent,
        trend: metric.classify_percent(change_percent),
    }
}

/// Trend of `metric` against the most recent history record.
pub fn analyze(current: &TestMetrics, history: &[TrendData], metric: TrendMetric) -> PerformanceTrend {
    let value = metric.value(current);
    match history.last() {
        Some(latest) => classify(value, metric.value(&latest.metrics), metric),
        None => PerformanceTrend::baseline(value),
    }
}

// ============================================================================
// Summary & insights
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub duration_trend: PerformanceTrend,
    pub pass_rate_trend: PerformanceTrend,
    pub test_count_trend: PerformanceTrend,
    pub flaky_tests_trend: PerformanceTrend,
}

pub fn trend_summary(current: &TestMetrics, history: &[TrendData]) -> TrendSummary {
    TrendSummary {
        duration_trend: analyze(current, history, TrendMetric::Duration),
        pass_rate_trend: analyze(current, history, TrendMetric::PassRate),
        test_count_trend: analyze(current, history, TrendMetric::TestCount),
        flaky_tests_trend: analyze(current, history, TrendMetric::FlakyCount),
    }
}

/// Plain-text observations for the publish sink.
pub fn performance_insights(current: &TestMetrics, summary: &TrendSummary) -> Vec<String> {
    let mut insights = Vec::new();

    let duration = &summary.duration_trend;
    match duration.trend {
        Trend::Declining => insights.push(format!(
            "Test execution time increased by {:.1}%",
            duration.change_percent
        )),
        Trend::Improving => insights.push(format!(
            "Test execution time improved by {:.1}%",
            duration.change_percent.abs()
        )),
        Trend::Stable => {}
    }

    let pass_rate = &summary.pass_rate_trend;
    match pass_rate.trend {
        Trend::Declining => insights.push(format!(
            "Pass rate decreased by {:.1}%",
            pass_rate.change_percent.abs()
        )),
        Trend::Improving => insights.push(format!(
            "Pass rate improved by {:.1}%",
            pass_rate.change_percent
        )),
        Trend::Stable => {}
    }

    let flaky = &summary.flaky_tests_trend;
    match flaky.trend {
        Trend::Declining => insights.push(format!(
            "Flaky tests increased by {:.0} ({:.1}%)",
            flaky.change, flaky.change_percent
        )),
        Trend::Improving => insights.push(format!(
            "Flaky tests decreased by {:.0}",
            flaky.change.abs()
        )),
        Trend::Stable => {}
    }

    if let Some(slowest) = current.slow_tests.first() {
        insights.push(format!(
            "{} tests are in the slowest 5% ({:.1}s+)",
            current.slow_tests.len(),
            slowest.duration
        ));
    }

    insights
}

// ============================================================================
// Window statistics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendStats {
    pub records: usize,
    pub average_duration: f64,
    pub average_pass_rate: f64,
    /// Oldest to newest record in the window.
    pub pass_rate_trend: Trend,
    pub duration_trend: Trend,
}

pub fn trend_stats(history: &[TrendData]) -> TrendStats {
    let (Some(oldest), Some(newest)) = (history.first(), history.last()) else {
        return TrendStats {
            records: 0,
            average_duration: 0.0,
            average_pass_rate: 0.0,
            pass_rate_trend: Trend::Stable,
            duration_trend: Trend::Stable,
        };
    };

    let n = history.len() as f64;
    let average_duration = history.iter().map(|t| t.metrics.total_duration).sum::<f64>() / n;
    let average_pass_rate = history.iter().map(|t| t.metrics.pass_rate).sum::<f64>() / n;

    let compare = |metric: TrendMetric| {
        classify(
            metric.value(&newest.metrics),
            metric.value(&oldest.metrics),
            metric,
        )
        .trend
    };

    TrendStats {
        records: history.len(),
        average_duration,
        average_pass_rate,
        pass_rate_trend: compare(TrendMetric::PassRate),
        duration_trend: compare(TrendMetric::Duration),
    }
}
