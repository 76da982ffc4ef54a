//! Collaborator wiring for audit, run-log and notification.

use std::sync::Arc;

use crate::config::{Config, SinkConfig, SinkKind, DEFAULT_AUDIT_TABLE, DEFAULT_RUN_LOG_TABLE};
use crate::drivers::oracle::{OracleAuditSink, OracleConnectivity, OracleRunLogStore};
use crate::error::{RefreshError, Result};
use crate::report::{
    AuditSink, FileAuditSink, FileRunLogStore, NoOpRunLogStore, Notifier, RunLogStore,
    TracingAuditSink, TracingNotifier,
};

/// The three collaborators a run reports through.
#[derive(Clone)]
pub struct Sinks {
    pub audit: Arc<dyn AuditSink>,
    pub run_log: Arc<dyn RunLogStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl Default for Sinks {
    /// Tracing-only audit and notification, run log not persisted.
    fn default() -> Self {
        Self {
            audit: Arc::new(TracingAuditSink),
            run_log: Arc::new(NoOpRunLogStore::new()),
            notifier: Arc::new(TracingNotifier),
        }
    }
}

impl Sinks {
    /// Build sinks from the `logging` section.
    ///
    /// Database sinks write to the target schema over their own connections.
    pub fn from_config(config: &Config, conn: &OracleConnectivity) -> Result<Self> {
        let audit: Arc<dyn AuditSink> = match config.logging.audit.kind {
            SinkKind::File => Arc::new(FileAuditSink::new(file_path(
                "logging.audit",
                &config.logging.audit,
            )?)),
            SinkKind::Database => Arc::new(OracleAuditSink::new(
                conn.target_session().clone(),
                conn.target_schema(),
                config.logging.audit.table_or(DEFAULT_AUDIT_TABLE),
            )),
        };

        let run_log: Arc<dyn RunLogStore> = match config.logging.run_log.kind {
            SinkKind::File => Arc::new(FileRunLogStore::new(file_path(
                "logging.run_log",
                &config.logging.run_log,
            )?)),
            SinkKind::Database => Arc::new(OracleRunLogStore::new(
                conn.target_session().clone(),
                conn.target_schema(),
                config.logging.run_log.table_or(DEFAULT_RUN_LOG_TABLE),
            )),
        };

        Ok(Self {
            audit,
            run_log,
            notifier: Arc::new(TracingNotifier),
        })
    }
}

fn file_path(field: &str, sink: &SinkConfig) -> Result<std::path::PathBuf> {
    sink.path
        .clone()
        .ok_or_else(|| RefreshError::Config(format!("{}.path is required for file sinks", field)))
}
