//! Partition reconciliation: make the target's partition set match the source.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::{isolate, Connectivity, PartitionDescriptor, Statement, UnitOutcome};
use crate::report::log::phase;
use crate::report::RunLog;

const PROCEDURE: &str = module_path!();

/// Partition actions computed from one catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// Target partitions without a source counterpart.
    pub drops: Vec<PartitionDescriptor>,

    /// Source partitions without a target counterpart.
    pub adds: Vec<PartitionDescriptor>,
}

impl PartitionPlan {
    pub fn is_empty(&self) -> bool {
        self.drops.is_empty() && self.adds.is_empty()
    }
}

/// Computes and applies partition plans.
pub struct PartitionReconciler {
    conn: Arc<dyn Connectivity>,
    seed_prefix: String,
    unit_timeout: Option<Duration>,
}

impl PartitionReconciler {
    pub fn new(conn: Arc<dyn Connectivity>, seed_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            seed_prefix: seed_prefix.into(),
            unit_timeout: None,
        }
    }

    pub fn with_unit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unit_timeout = timeout;
        self
    }

    /// Diff two partition snapshots by (table, partition) key.
    ///
    /// Seed partitions are ignored on both sides. Both sets are sorted by key.
    pub fn reconcile(
        &self,
        source: &[PartitionDescriptor],
        target: &[PartitionDescriptor],
    ) -> PartitionPlan {
        let source: Vec<_> = source
            .iter()
            .filter(|p| !p.is_seed(&self.seed_prefix))
            .collect();
        let target: Vec<_> = target
            .iter()
            .filter(|p| !p.is_seed(&self.seed_prefix))
            .collect();

        let source_keys: HashSet<_> = source.iter().map(|p| p.key()).collect();
        let target_keys: HashSet<_> = target.iter().map(|p| p.key()).collect();

        let mut drops: Vec<PartitionDescriptor> = target
            .iter()
            .filter(|p| !source_keys.contains(&p.key()))
            .map(|p| (*p).clone())
            .collect();
        let mut adds: Vec<PartitionDescriptor> = source
            .iter()
            .filter(|p| !target_keys.contains(&p.key()))
            .map(|p| (*p).clone())
            .collect();

        drops.sort_by(|a, b| a.key().cmp(&b.key()));
        drops.dedup_by(|a, b| a.key() == b.key());
        adds.sort_by(|a, b| a.key().cmp(&b.key()));
        adds.dedup_by(|a, b| a.key() == b.key());

        info!(
            "Partition plan: {} to drop, {} to add",
            drops.len(),
            adds.len()
        );
        PartitionPlan { drops, adds }
    }

    /// Drop every partition in the plan. Returns the number of attempts.
    pub async fn apply_drops(&self, plan: &PartitionPlan, log: &RunLog) -> usize {
        for p in &plan.drops {
            let statement = Statement::DropPartition {
                table: p.table_name.clone(),
                partition: p.partition_name.clone(),
            };
            self.apply(&statement, &p.table_name, phase::DROP_PARTITION, log)
                .await;
        }
        plan.drops.len()
    }

    /// Add every partition in the plan. Returns the number of attempts.
    pub async fn apply_adds(&self, plan: &PartitionPlan, log: &RunLog) -> usize {
        for p in &plan.adds {
            let statement = Statement::AddPartition {
                table: p.table_name.clone(),
                partition: p.partition_name.clone(),
                bound: p.high_value.clone(),
            };
            self.apply(&statement, &p.table_name, phase::ADD_PARTITION, log)
                .await;
        }
        plan.adds.len()
    }

    async fn apply(&self, statement: &Statement, table: &str, label: &str, log: &RunLog) {
        debug!("{}", statement);
        if let UnitOutcome::Failed(e) = isolate(self.unit_timeout, self.conn.execute(statement)).await
        {
            log.record_failure(PROCEDURE, Some(table), label, &e);
        }
    }
}
