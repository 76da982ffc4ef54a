//! File-backed run log store and audit sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::backend::{AuditLevel, AuditSink, RunLogStore};
use super::log::LogEntry;
use crate::error::{RefreshError, Result};

/// One persisted run in the JSON log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRun {
    pub run_id: String,
    pub persisted_at: DateTime<Utc>,
    pub entries: Vec<LogEntry>,
}

/// Run log kept as a JSON array of runs.
///
/// Each append rewrites the file atomically (temp file, then rename).
pub struct FileRunLogStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRunLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Load all runs stored so far.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<StoredRun>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl RunLogStore for FileRunLogStore {
    async fn append_batch(&self, run_id: &str, entries: &[LogEntry]) -> Result<()> {
        let _guard = self.lock.lock().await;

        let mut runs = Self::load(&self.path)?;
        runs.push(StoredRun {
            run_id: run_id.to_string(),
            persisted_at: Utc::now(),
            entries: entries.to_vec(),
        });

        let content = serde_json::to_string_pretty(&runs)?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &self.path)?;

        debug!(
            "Persisted {} log entries for run {} to {:?}",
            entries.len(),
            run_id,
            self.path
        );
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}

/// One line of the audit file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub logged_at: DateTime<Utc>,
    pub level: AuditLevel,
    pub module: String,
    pub message: String,
}

/// Audit sink appending JSON lines, synced to disk on every record.
pub struct FileAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Read back every record in the file.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>> {
        let content = std::fs::read_to_string(path)?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str::<AuditRecord>(l).map_err(RefreshError::from))
            .collect()
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, level: AuditLevel, module: &str, message: &str) -> Result<()> {
        let _guard = self.lock.lock().await;

        let record = AuditRecord {
            logged_at: Utc::now(),
            level,
            module: module.to_string(),
            message: message.to_string(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}
