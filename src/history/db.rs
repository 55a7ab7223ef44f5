use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::DurableStore;
use crate::model::{FrameworkKind, TestMetrics, TrendData};

const ARTIFACT_PREFIX: &str = "test-metrics-trends";

/// Name under which one pipeline's records are kept, e.g.
/// `test-metrics-trends-jest-node18`.
pub fn artifact_name(framework: FrameworkKind, suffix: Option<&str>) -> String {
    match suffix.filter(|s| !s.is_empty()) {
        Some(suffix) => format!("{}-{}-{}", ARTIFACT_PREFIX, framework, suffix),
        None => format!("{}-{}", ARTIFACT_PREFIX, framework),
    }
}

/// Fixed-width UTC timestamps so that text order is chronological order.
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Durable store in SQLite, scoped to one artifact name.
pub struct SqliteTrendStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    artifact_name: String,
    retention_days: u32,
}

impl SqliteTrendStore {
    pub fn new(state_dir: &Path, artifact_name: String, retention_days: u32) -> anyhow::Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        Self::open(&state_dir.join("trends.db"), artifact_name, retention_days)
    }

    pub fn open(db_path: &Path, artifact_name: String, retention_days: u32) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
            artifact_name,
            retention_days,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS trend_records (
                artifact_name TEXT NOT NULL,
                run_id TEXT NOT NULL,
                matrix_key TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                metrics_json TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                PRIMARY KEY (artifact_name, run_id, matrix_key)
            );

            CREATE INDEX IF NOT EXISTS idx_tr_artifact_ts ON trend_records(artifact_name, timestamp);
        ",
        )?;
        Ok(())
    }

    /// Delete this artifact's records older than the retention window.
    pub fn prune(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let cutoff = now - Duration::days(i64::from(self.retention_days));
        let conn = self.conn();
        let removed = conn.execute(
            "DELETE FROM trend_records WHERE artifact_name = ?1 AND timestamp < ?2",
            params![self.artifact_name, encode_timestamp(&cutoff)],
        )?;
        if removed > 0 {
            debug!("Pruned {} expired trend records", removed);
        }
        Ok(removed)
    }

    pub fn count(&self) -> anyhow::Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trend_records WHERE artifact_name = ?1",
            params![self.artifact_name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl DurableStore for SqliteTrendStore {
    /// Newest `limit` records, returned oldest first. Rows that no longer
    /// decode are skipped.
    fn load_recent(&self, limit: usize) -> anyhow::Result<Vec<TrendData>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT run_id, matrix_key, timestamp, commit_sha, metrics_json
             FROM trend_records
             WHERE artifact_name = ?1
             ORDER BY timestamp DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(
            params![self.artifact_name, limit.min(i64::MAX as usize) as i64],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;

        let mut records = Vec::new();
        for row in rows {
            let (run_id, matrix_key, timestamp, commit_sha, metrics_json) = row?;
            let timestamp = match DateTime::parse_from_rfc3339(&timestamp) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) => {
                    warn!("Skipping trend record {} with bad timestamp: {}", run_id, e);
                    continue;
                }
            };
            let metrics: TestMetrics = match serde_json::from_str(&metrics_json) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping trend record {} with bad metrics: {}", run_id, e);
                    continue;
                }
            };
            records.push(TrendData {
                timestamp,
                commit_sha,
                metrics,
                run_id,
                matrix_key: (!matrix_key.is_empty()).then_some(matrix_key),
            });
        }

        records.reverse();
        Ok(records)
    }

    /// Upsert `record`, then prune expired records.
    fn save(&self, record: &TrendData) -> anyhow::Result<()> {
        let metrics_json = serde_json::to_string(&record.metrics)?;
        let now = Utc::now();
        {
            let conn = self.conn();
            conn.execute(
                "INSERT OR REPLACE INTO trend_records
                    (artifact_name, run_id, matrix_key, timestamp, commit_sha, metrics_json, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    self.artifact_name,
                    record.run_id,
                    record.matrix_key.as_deref().unwrap_or(""),
                    encode_timestamp(&record.timestamp),
                    record.commit_sha,
                    metrics_json,
                    encode_timestamp(&now),
                ],
            )?;
        }
        self.prune(now)?;
        Ok(())
    }
}
