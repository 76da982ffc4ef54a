//! Run-scoped failure log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::warn;

use crate::error::RefreshError;

/// Upper bound for a persisted message, in bytes.
pub const MESSAGE_MAX_LEN: usize = 4000;

/// Table name recorded for entries not tied to a table.
pub const NOT_APPLICABLE: &str = "N/A";

/// Phase labels recorded on log entries.
pub mod phase {
    pub const DISABLE_CONSTRAINTS: &str = "disabling constraints";
    pub const ENABLE_CONSTRAINTS: &str = "enable constraints";
    pub const DROP_PARTITION: &str = "drop partition";
    pub const ADD_PARTITION: &str = "add partition";
    pub const TRUNCATE_INSERT: &str = "truncate/insert together";
    pub const REFRESH_MV: &str = "refresh MV";
    /// Unit never started because the run was cancelled.
    pub const CANCELLED: &str = "cancelled";
    pub const FATAL: &str = "fatal";
}

/// One recorded failure (or the fatal abort entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,

    /// Component that recorded it.
    pub procedure_name: String,

    /// Affected table, or [`NOT_APPLICABLE`].
    pub table_name: String,

    /// Stage label, see [`phase`].
    pub phase: String,

    /// `<code>: <detail>`, at most [`MESSAGE_MAX_LEN`] bytes.
    pub message: String,
}

impl LogEntry {
    pub fn new(
        procedure_name: &str,
        table_name: Option<&str>,
        phase: &str,
        message: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            procedure_name: procedure_name.to_string(),
            table_name: table_name.unwrap_or(NOT_APPLICABLE).to_string(),
            phase: phase.to_string(),
            message: truncate_bytes(message, MESSAGE_MAX_LEN).to_string(),
        }
    }

    /// Entry for a failed unit: the error code followed by its (truncated) text.
    pub fn failure(
        procedure_name: &str,
        table_name: Option<&str>,
        phase: &str,
        error: &RefreshError,
    ) -> Self {
        let message = bounded_message(&error.code(), &error.to_string());
        Self::new(procedure_name, table_name, phase, &message)
    }
}

/// Combine a code and detail text, truncating the detail to fit the bound.
pub fn bounded_message(code: &str, detail: &str) -> String {
    let prefix = format!("{}: ", code);
    let budget = MESSAGE_MAX_LEN.saturating_sub(prefix.len());
    let message = format!("{}{}", prefix, truncate_bytes(detail, budget));
    truncate_bytes(&message, MESSAGE_MAX_LEN).to_string()
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Append-only, thread-safe collection of a run's entries.
///
/// Recording never fails: a poisoned lock is recovered rather than propagated.
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(entry);
    }

    /// Record a unit failure and emit it as a warning.
    pub fn record_failure(
        &self,
        procedure_name: &str,
        table_name: Option<&str>,
        phase: &str,
        error: &RefreshError,
    ) {
        warn!(
            "{} [{}] failed: {}",
            table_name.unwrap_or(NOT_APPLICABLE),
            phase,
            error
        );
        self.record(LogEntry::failure(procedure_name, table_name, phase, error));
    }

    /// Snapshot of all entries in accumulation order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries recorded under `phase`.
    pub fn count_phase(&self, phase: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.phase == phase)
            .count()
    }
}
