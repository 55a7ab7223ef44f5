pub mod calculator;
pub mod trends;

pub use calculator::compute_metrics;
pub use trends::{classify, trend_summary, TrendMetric, TrendStats, TrendSummary};
