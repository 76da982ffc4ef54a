//! Referential constraint gate around the data-moving phases.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::{isolate, ConstraintDescriptor, Connectivity, Statement, UnitOutcome};
use crate::report::log::phase;
use crate::report::RunLog;

const PROCEDURE: &str = module_path!();

/// Disables and re-enables target foreign keys, one isolated unit each.
pub struct ConstraintGate {
    conn: Arc<dyn Connectivity>,
    unit_timeout: Option<Duration>,
}

impl ConstraintGate {
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

    /// Disable every constraint in list order. Returns the number of attempts.
    pub async fn disable_all(&self, constraints: &[ConstraintDescriptor], log: &RunLog) -> usize {
        info!("Disabling {} referential constraints", constraints.len());
        self.apply_all(constraints, log, false).await
    }

    /// Re-enable every constraint in list order. Returns the number of attempts.
    ///
    /// Called with the same list that was disabled, whatever happened since.
    pub async fn enable_all(&self, constraints: &[ConstraintDescriptor], log: &RunLog) -> usize {
        info!("Re-enabling {} referential constraints", constraints.len());
        self.apply_all(constraints, log, true).await
    }

    async fn apply_all(
        &self,
        constraints: &[ConstraintDescriptor],
        log: &RunLog,
        enable: bool,
    ) -> usize {
        let mut attempts = 0;
        for c in constraints {
            let statement = if enable {
                Statement::EnableConstraint {
                    table: c.table_name.clone(),
                    constraint: c.constraint_name.clone(),
                }
            } else {
                Statement::DisableConstraint {
                    table: c.table_name.clone(),
                    constraint: c.constraint_name.clone(),
                }
            };
            attempts += 1;
            debug!("{}", statement);

            let outcome = isolate(self.unit_timeout, self.conn.execute(&statement)).await;
            if let UnitOutcome::Failed(e) = outcome {
                let label = if enable {
                    phase::ENABLE_CONSTRAINTS
                } else {
                    phase::DISABLE_CONSTRAINTS
                };
                log.record_failure(PROCEDURE, Some(&c.table_name), label, &e);
            }
        }
        attempts
    }
}
