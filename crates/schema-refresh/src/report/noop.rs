//! Fallback collaborators that persist nothing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

use super::backend::{AuditLevel, AuditSink, Notifier, RunLogStore};
use super::log::LogEntry;
use crate::error::Result;

/// Run log store that drops entries.
///
/// Logs a warning on first use.
pub struct NoOpRunLogStore {
    warned: AtomicBool,
}

impl NoOpRunLogStore {
    pub fn new() -> Self {
        Self {
            warned: AtomicBool::new(false),
        }
    }
}

impl Default for NoOpRunLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunLogStore for NoOpRunLogStore {
    async fn append_batch(&self, run_id: &str, entries: &[LogEntry]) -> Result<()> {
        if !self.warned.swap(true, Ordering::SeqCst) {
            warn!(
                "No run log store configured: {} entries of run {} are not persisted",
                entries.len(),
                run_id
            );
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "noop"
    }
}

/// Audit sink that only emits tracing events.
#[derive(Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, level: AuditLevel, module: &str, message: &str) -> Result<()> {
        match level {
            AuditLevel::Info => info!(target: "audit", "{}: {}", module, message),
            AuditLevel::Warn => warn!(target: "audit", "{}: {}", module, message),
            AuditLevel::Fatal => error!(target: "audit", "[fatal] {}: {}", module, message),
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "tracing"
    }
}

/// Notifier that writes the summary to the log.
#[derive(Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        info!("{}\n{}", subject, body);
        Ok(())
    }
}
