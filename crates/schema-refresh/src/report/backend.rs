//! Collaborator traits for persisting and publishing run output.
//!
//! - [`RunLogStore`]: durable storage for a run's log entries
//! - [`AuditSink`]: transaction-independent audit records (milestones, fatal aborts)
//! - [`Notifier`]: best-effort delivery of the run summary
//!
//! The orchestrator works with `Arc<dyn ...>` and never sees concrete types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::log::LogEntry;
use crate::error::Result;

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    Info,
    Warn,
    Fatal,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Info => "info",
            AuditLevel::Warn => "warn",
            AuditLevel::Fatal => "fatal",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only store for run log entries.
///
/// Written once per run, at the end of the report phase.
#[async_trait]
pub trait RunLogStore: Send + Sync {
    /// Persist every entry of one run.
    async fn append_batch(&self, run_id: &str, entries: &[LogEntry]) -> Result<()>;

    /// Backend type name for logging.
    fn backend_type(&self) -> &'static str;
}

/// Audit log whose writes survive the caller's own failure or rollback.
///
/// Implementations must commit each record on their own, independent of any
/// work the caller has in flight.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, level: AuditLevel, module: &str, message: &str) -> Result<()>;

    fn backend_type(&self) -> &'static str;
}

/// Delivery channel for the run summary.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}
