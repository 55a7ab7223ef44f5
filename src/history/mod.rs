pub mod cache;
pub mod db;

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::model::TrendData;

// ============================================================================
// Store contracts
// ============================================================================

/// Short-retention history store. Best effort: callers treat failures as
/// empty history.
pub trait FastStore {
    fn load(&self) -> anyhow::Result<Vec<TrendData>>;
    fn save(&self, records: &[TrendData]) -> anyhow::Result<()>;
}

/// Long-retention history store, one record per save.
pub trait DurableStore {
    fn load_recent(&self, limit: usize) -> anyhow::Result<Vec<TrendData>>;
    fn save(&self, record: &TrendData) -> anyhow::Result<()>;
}

// ============================================================================
// Merge
// ============================================================================

/// Merge two histories into one deduplicated, time-ascending sequence.
///
/// Records are identified by `(run_id, matrix_key)`. When both sources hold
/// the same key the fast-store copy wins; within one source the first copy
/// wins. Inputs are not modified.
pub fn merge_histories(fast: &[TrendData], durable: &[TrendData]) -> Vec<TrendData> {
    let mut seen: HashSet<(&str, Option<&str>)> = HashSet::new();
    let mut merged: Vec<TrendData> = fast
        .iter()
        .chain(durable)
        .filter(|record| seen.insert(record.key()))
        .cloned()
        .collect();

    merged.sort_by_key(|record| record.timestamp);
    merged
}

/// Records newer than `retention_days` before `now`, oldest first.
pub fn retain_window(
    records: Vec<TrendData>,
    now: DateTime<Utc>,
    retention_days: u32,
) -> Vec<TrendData> {
    let cutoff = now - Duration::days(i64::from(retention_days));
    let mut kept: Vec<TrendData> = records
        .into_iter()
        .filter(|r| r.timestamp >= cutoff)
        .collect();
    kept.sort_by_key(|r| r.timestamp);
    kept
}

/// Load both stores and merge them. A failing store contributes nothing.
pub fn load_history(
    fast: &dyn FastStore,
    durable: &dyn DurableStore,
    durable_limit: usize,
) -> Vec<TrendData> {
    let fast_records = fast.load().unwrap_or_else(|e| {
        warn!("Failed to load cached trend data: {}", e);
        Vec::new()
    });
    let durable_records = durable.load_recent(durable_limit).unwrap_or_else(|e| {
        warn!("Failed to load durable trend data: {}", e);
        Vec::new()
    });

    let merged = merge_histories(&fast_records, &durable_records);
    info!(
        "Loaded {} historical trend records ({} cached, {} durable)",
        merged.len(),
        fast_records.len(),
        durable_records.len()
    );
    merged
}
