//! Table content replication: truncate the target table, reload from source.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::{isolate, Connectivity, Statement, TableDescriptor, UnitOutcome};
use crate::error::{RefreshError, Result};
use crate::report::log::{bounded_message, phase, LogEntry};
use crate::report::RunLog;

const PROCEDURE: &str = module_path!();

/// Message recorded for tables skipped by cancellation.
pub const CANCELLED_BEFORE_START: &str = "cancelled before start";

/// Counts of one sync phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub attempted: usize,
    pub succeeded: usize,
}

/// Replicates table content with bounded parallelism.
pub struct TableSynchronizer {
    conn: Arc<dyn Connectivity>,
    workers: usize,
    unit_timeout: Option<Duration>,
}

impl TableSynchronizer {
    pub fn new(conn: Arc<dyn Connectivity>) -> Self {
        Self {
            conn,
            workers: 1,
            unit_timeout: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_unit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unit_timeout = timeout;
        self
    }

    /// Truncate and reload every table.
    ///
    /// Each table is one isolated unit; its failure is recorded under
    /// `"truncate/insert together"` and the remaining tables still run.
    /// Failures are recorded in `tables` order whatever the completion order.
    pub async fn sync_all(
        &self,
        tables: &[TableDescriptor],
        log: &RunLog,
        cancel: &CancellationToken,
    ) -> SyncSummary {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        info!(
            "Synchronizing {} tables with {} workers",
            tables.len(),
            self.workers
        );

        let mut handles: Vec<(String, Option<JoinHandle<UnitOutcome<u64>>>)> =
            Vec::with_capacity(tables.len());

        for table in tables {
            let name = table.name.clone();
            if cancel.is_cancelled() {
                handles.push((name, None));
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                handles.push((name, None));
                continue;
            };

            let conn = self.conn.clone();
            let timeout = self.unit_timeout;
            let table_name = name.clone();
            let handle = tokio::spawn(async move {
                let outcome = isolate(timeout, sync_table(conn, &table_name)).await;
                drop(permit);
                outcome
            });
            handles.push((name, Some(handle)));
        }

        let mut summary = SyncSummary {
            attempted: tables.len(),
            succeeded: 0,
        };

        for (name, handle) in handles {
            let Some(handle) = handle else {
                log.record(LogEntry::new(
                    PROCEDURE,
                    Some(&name),
                    phase::CANCELLED,
                    &bounded_message(&RefreshError::Cancelled.code(), CANCELLED_BEFORE_START),
                ));
                continue;
            };

            match handle.await {
                Ok(UnitOutcome::Done(rows)) => {
                    info!("{}: synchronized ({} rows)", name, rows);
                    summary.succeeded += 1;
                }
                Ok(UnitOutcome::Failed(e)) => {
                    log.record_failure(PROCEDURE, Some(&name), phase::TRUNCATE_INSERT, &e);
                }
                Err(e) => {
                    error!("{}: task panicked - {}", name, e);
                    let e = RefreshError::unit(format!("sync of {}", name), format!("task panicked: {}", e));
                    log.record_failure(PROCEDURE, Some(&name), phase::TRUNCATE_INSERT, &e);
                }
            }
        }

        info!(
            "Sync complete: {}/{} tables succeeded",
            summary.succeeded, summary.attempted
        );
        summary
    }
}

/// Truncate then copy one table. Either step failing fails the unit.
async fn sync_table(conn: Arc<dyn Connectivity>, table: &str) -> Result<u64> {
    let truncate = Statement::Truncate {
        table: table.to_string(),
    };
    debug!("{}", truncate);
    conn.execute(&truncate).await?;
    conn.copy_rows(table).await
}
