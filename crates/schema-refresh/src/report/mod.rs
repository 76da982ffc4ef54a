//! Run reporting: summary text, log persistence and notification.
//!
//! The reporter sees collaborators only through the traits in [`backend`];
//! concrete stores live in [`file`], [`noop`] and the ODBC driver.

pub mod backend;
pub mod file;
pub mod log;
pub mod noop;

pub use backend::{AuditLevel, AuditSink, Notifier, RunLogStore};
pub use file::{FileAuditSink, FileRunLogStore};
pub use log::{LogEntry, RunLog};
pub use noop::{NoOpRunLogStore, TracingAuditSink, TracingNotifier};

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{RefreshError, Result};
use crate::run::{ReplicationRun, RunOutcome};

/// Default cap on failures listed in the report body.
pub const MAX_REPORTED_FAILURES: usize = 12;

/// Rendered run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub subject: String,
    pub body: String,
}

/// Builds, persists and publishes the end-of-run report.
pub struct RunReporter {
    store: Arc<dyn RunLogStore>,
    notifier: Arc<dyn Notifier>,
    max_reported_failures: usize,
}

impl RunReporter {
    pub fn new(store: Arc<dyn RunLogStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            max_reported_failures: MAX_REPORTED_FAILURES,
        }
    }

    /// Override the number of failures listed in the body (minimum 1).
    pub fn with_max_reported_failures(mut self, max: usize) -> Self {
        self.max_reported_failures = max.max(1);
        self
    }

    /// Subject and body for a completed run.
    pub fn summarize(&self, run: &ReplicationRun) -> RunReport {
        let entries = run.entries();
        let outcome = run.outcome();

        let subject = format!(
            "Schema refresh {}: {} tables processed - {}",
            run.target, run.tables_attempted, outcome
        );

        let mut body = String::new();
        let _ = writeln!(
            body,
            "{} of {} tables synchronized successfully.",
            run.tables_synced, run.tables_attempted
        );

        if matches!(outcome, RunOutcome::FullSuccess) {
            let _ = writeln!(body, "Refresh completed with no failures.");
            return RunReport { subject, body };
        }

        let _ = writeln!(body, "Failures ({}):", entries.len());
        for entry in entries.iter().take(self.max_reported_failures) {
            let _ = writeln!(
                body,
                "  {} / {} / {}",
                entry.table_name, entry.phase, entry.message
            );
        }
        if entries.len() > self.max_reported_failures {
            let _ = writeln!(
                body,
                "  ... and {} more",
                entries.len() - self.max_reported_failures
            );
        }

        if entries.iter().any(|e| e.phase == log::phase::TRUNCATE_INSERT) {
            let _ = writeln!(
                body,
                "WARNING: tables that failed during truncate/insert may have been left empty on target."
            );
        }

        RunReport { subject, body }
    }

    /// Write every entry of the run to the store. A failure here is fatal.
    pub async fn persist(&self, run: &ReplicationRun) -> Result<()> {
        let entries = run.entries();
        self.store
            .append_batch(&run.run_id, &entries)
            .await
            .map_err(|e| match e {
                RefreshError::Store(_) => e,
                other => RefreshError::Store(other.to_string()),
            })?;
        info!(
            "Persisted {} log entries via {} store",
            entries.len(),
            self.store.backend_type()
        );
        Ok(())
    }

    /// Deliver the report. Delivery failures are only logged.
    pub async fn notify(&self, report: &RunReport) {
        if let Err(e) = self.notifier.send(&report.subject, &report.body).await {
            warn!("Failed to deliver run report: {}", e);
        }
    }

    /// Summarize, persist, then notify.
    pub async fn finalize(&self, run: &ReplicationRun) -> Result<RunReport> {
        let report = self.summarize(run);
        self.persist(run).await?;
        self.notify(&report).await;
        Ok(report)
    }
}
