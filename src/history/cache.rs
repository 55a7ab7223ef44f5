use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{retain_window, FastStore};
use crate::model::TrendData;

/// Fast store backed by a single JSON file under the state directory.
pub struct JsonTrendCache {
    path: PathBuf,
    retention_days: u32,
}

impl JsonTrendCache {
    pub fn new(state_dir: &Path, key_prefix: &str, retention_days: u32) -> Self {
        Self {
            path: state_dir.join(format!("{}-trends.json", key_prefix)),
            retention_days,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record`, drop entries older than the retention window and
    /// persist. Returns how many records were kept.
    pub fn record(&self, record: TrendData, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let mut records = self.load()?;
        records.push(record);
        let kept = retain_window(records, now, self.retention_days);
        self.save(&kept)?;
        info!("Saved trend data for {} runs", kept.len());
        Ok(kept.len())
    }

    /// Records from the last `days` days.
    pub fn recent(&self, days: u32, now: DateTime<Utc>) -> anyhow::Result<Vec<TrendData>> {
        Ok(retain_window(self.load()?, now, days))
    }

    pub fn latest(&self) -> anyhow::Result<Option<TrendData>> {
        Ok(self.load()?.pop())
    }
}

impl FastStore for JsonTrendCache {
    /// Missing file is empty history; a corrupt file is logged and treated
    /// the same way.
    fn load(&self) -> anyhow::Result<Vec<TrendData>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Vec<TrendData>>(&content) {
            Ok(mut records) => {
                records.sort_by_key(|r| r.timestamp);
                Ok(records)
            }
            Err(e) => {
                warn!("Ignoring unreadable trend cache {:?}: {}", self.path, e);
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, records: &[TrendData]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
