//! Status snapshot file, replaced atomically on each checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::error::PersistenceError;

/// Progress summary readable by external monitors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub run_id: String,
    pub total_categories: usize,
    pub completed_categories: usize,
    pub failed_categories: usize,
    pub skipped_categories: usize,
    pub best_products_count: usize,
    pub total_cost: f64,
    /// Accepted categories per hour.
    pub throughput: f64,
    /// Percentage of processed categories that were accepted.
    pub pass_rate: f64,
    pub eta_seconds: Option<u64>,
    pub last_updated: DateTime<Utc>,
}

/// Write `snapshot` to `path` through a temporary file in the same directory.
pub fn write_snapshot(path: &Path, snapshot: &StatusSnapshot) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, snapshot)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Read the last snapshot, if one was written.
pub fn read_snapshot(path: &Path) -> Result<Option<StatusSnapshot>, PersistenceError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
