//! Materialized view refresh on the target.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::{isolate, Connectivity, RefreshMode, Statement, UnitOutcome, ViewDescriptor};
use crate::report::log::phase;
use crate::report::RunLog;

const PROCEDURE: &str = module_path!();

/// Refreshes demand-mode views, one isolated unit each.
pub struct ViewRefresher {
    conn: Arc<dyn Connectivity>,
    unit_timeout: Option<Duration>,
}

impl ViewRefresher {
    pub fn new(conn: Arc<dyn Connectivity>) -> Self {
        Self {
            conn,
            unit_timeout: None,
        }
    }

    pub fn with_unit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unit_timeout = timeout;
        self
    }

    /// Refresh every demand-mode view. Returns the number refreshed successfully.
    pub async fn refresh_all(&self, views: &[ViewDescriptor], log: &RunLog) -> usize {
        let mut refreshed = 0;
        for view in views.iter().filter(|v| v.refresh_mode == RefreshMode::Demand) {
            let statement = Statement::RefreshView {
                view: view.name.clone(),
            };
            debug!("{}", statement);
            match isolate(self.unit_timeout, self.conn.execute(&statement)).await {
                UnitOutcome::Done(()) => refreshed += 1,
                UnitOutcome::Failed(e) => {
                    log.record_failure(PROCEDURE, Some(&view.name), phase::REFRESH_MV, &e)
                }
            }
        }
        info!("Refreshed {} materialized views", refreshed);
        refreshed
    }
}
