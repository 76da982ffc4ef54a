//! In-memory collaborators for component and end-to-end tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::{
    ConstraintDescriptor, Connectivity, PartitionDescriptor, RefreshMode, Side, Statement,
    TableDescriptor, ViewDescriptor,
};
use crate::error::{RefreshError, Result};
use crate::report::{AuditLevel, AuditSink, LogEntry, Notifier, RunLogStore};

#[derive(Default)]
struct MemoryState {
    tables: Vec<TableDescriptor>,
    source_rows: HashMap<String, Vec<i64>>,
    target_rows: HashMap<String, Vec<i64>>,
    source_partitions: Vec<PartitionDescriptor>,
    target_partitions: Vec<PartitionDescriptor>,
    constraints: Vec<ConstraintDescriptor>,
    disabled: HashSet<String>,
    views: Vec<ViewDescriptor>,
    refreshed: Vec<String>,
    executed: Vec<Statement>,
    copies: Vec<String>,
    failures: HashSet<String>,
    panics: HashSet<String>,
    delays: HashMap<String, Duration>,
    blocking_copies: HashMap<String, Duration>,
    catalog_failures: HashSet<Side>,
    catalog_panics: HashSet<Side>,
    journal: Vec<String>,
}

/// Source and target schemas held in memory.
///
/// Failures are injected by key: `disable:<constraint>`, `enable:<constraint>`,
/// `drop:<table>.<partition>`, `add:<table>.<partition>`, `truncate:<table>`,
/// `copy:<table>`, `refresh:<view>`.
pub struct MemoryConnectivity {
    target: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnectivity {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    fn with_state(self, f: impl FnOnce(&mut MemoryState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    /// A permanent table with the given source rows; the target holds stale rows.
    pub fn with_table(self, name: &str, rows: &[i64]) -> Self {
        self.with_state(|s| {
            s.tables.push(TableDescriptor::new(name));
            s.source_rows.insert(name.to_string(), rows.to_vec());
            s.target_rows.insert(name.to_string(), vec![-1, -2]);
        })
    }

    /// A source catalog entry with explicit flags and no rows.
    pub fn with_table_descriptor(self, table: TableDescriptor) -> Self {
        self.with_state(|s| s.tables.push(table))
    }

    pub fn with_partition(self, side: Side, table: &str, partition: &str, high: &str) -> Self {
        self.with_state(|s| {
            let p = PartitionDescriptor::new(table, partition, high);
            match side {
                Side::Source => s.source_partitions.push(p),
                Side::Target => s.target_partitions.push(p),
            }
        })
    }

    pub fn with_constraint(self, table: &str, constraint: &str) -> Self {
        self.with_state(|s| {
            s.constraints
                .push(ConstraintDescriptor::new(table, constraint))
        })
    }

    pub fn with_view(self, name: &str, mode: RefreshMode) -> Self {
        self.with_state(|s| s.views.push(ViewDescriptor::new(name, mode)))
    }

    pub fn fail_on(self, key: &str) -> Self {
        self.with_state(|s| {
            s.failures.insert(key.to_string());
        })
    }

    pub fn panic_on(self, key: &str) -> Self {
        self.with_state(|s| {
            s.panics.insert(key.to_string());
        })
    }

    pub fn delay_on(self, key: &str, delay: Duration) -> Self {
        self.with_state(|s| {
            s.delays.insert(key.to_string(), delay);
        })
    }

    /// Run the copy of `table` on the blocking pool, committing after `duration`
    /// whether or not the caller is still waiting.
    pub fn blocking_copy(self, table: &str, duration: Duration) -> Self {
        self.with_state(|s| {
            s.blocking_copies.insert(table.to_string(), duration);
        })
    }

    pub fn panic_catalog(self, side: Side) -> Self {
        self.with_state(|s| {
            s.catalog_panics.insert(side);
        })
    }

    pub fn fail_catalog(self, side: Side) -> Self {
        self.with_state(|s| {
            s.catalog_failures.insert(side);
        })
    }

    /// Every statement attempted, failed ones included.
    pub fn executed(&self) -> Vec<Statement> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn rows(&self, side: Side, table: &str) -> Vec<i64> {
        let state = self.state.lock().unwrap();
        let rows = match side {
            Side::Source => &state.source_rows,
            Side::Target => &state.target_rows,
        };
        rows.get(table).cloned().unwrap_or_default()
    }

    pub fn partitions(&self, side: Side) -> Vec<PartitionDescriptor> {
        let state = self.state.lock().unwrap();
        match side {
            Side::Source => state.source_partitions.clone(),
            Side::Target => state.target_partitions.clone(),
        }
    }

    pub fn disabled_constraints(&self) -> Vec<String> {
        let mut v: Vec<_> = self.state.lock().unwrap().disabled.iter().cloned().collect();
        v.sort();
        v
    }

    pub fn refreshed_views(&self) -> Vec<String> {
        self.state.lock().unwrap().refreshed.clone()
    }

    /// Successful statement keys and `copied:<table>` commits, in completion order.
    pub fn journal(&self) -> Vec<String> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Tables copied successfully, in completion order.
    pub fn copies(&self) -> Vec<String> {
        self.state.lock().unwrap().copies.clone()
    }

    fn statement_key(statement: &Statement) -> String {
        match statement {
            Statement::DisableConstraint { constraint, .. } => format!("disable:{}", constraint),
            Statement::EnableConstraint { constraint, .. } => format!("enable:{}", constraint),
            Statement::DropPartition { table, partition } => {
                format!("drop:{}.{}", table, partition)
            }
            Statement::AddPartition {
                table, partition, ..
            } => format!("add:{}.{}", table, partition),
            Statement::Truncate { table } => format!("truncate:{}", table),
            Statement::RefreshView { view } => format!("refresh:{}", view),
        }
    }

    /// Apply delay, panic and failure injection for `key`.
    async fn inject(&self, key: &str) -> Result<()> {
        let (delay, panics, fails) = {
            let state = self.state.lock().unwrap();
            (
                state.delays.get(key).copied(),
                state.panics.contains(key),
                state.failures.contains(key),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if panics {
            panic!("injected panic at {}", key);
        }
        if fails {
            return Err(RefreshError::database(
                key.to_string(),
                "ORA-00054: resource busy and acquire with NOWAIT specified",
            ));
        }
        Ok(())
    }

    fn check_catalog(&self, side: Side) -> Result<()> {
        if self.state.lock().unwrap().catalog_panics.contains(&side) {
            panic!("injected panic reading {} catalog", side);
        }
        if self.state.lock().unwrap().catalog_failures.contains(&side) {
            return Err(RefreshError::database(
                format!("reading {} catalog", side),
                "ORA-00942: table or view does not exist",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Connectivity for MemoryConnectivity {
    async fn fetch_tables(&self, side: Side) -> Result<Vec<TableDescriptor>> {
        self.check_catalog(side)?;
        Ok(self.state.lock().unwrap().tables.clone())
    }

    async fn fetch_partitions(&self, side: Side) -> Result<Vec<PartitionDescriptor>> {
        self.check_catalog(side)?;
        Ok(self.partitions(side))
    }

    async fn fetch_referential_constraints(
        &self,
        side: Side,
    ) -> Result<Vec<ConstraintDescriptor>> {
        self.check_catalog(side)?;
        Ok(self.state.lock().unwrap().constraints.clone())
    }

    async fn fetch_materialized_views(&self, side: Side) -> Result<Vec<ViewDescriptor>> {
        self.check_catalog(side)?;
        Ok(self.state.lock().unwrap().views.clone())
    }

    async fn execute(&self, statement: &Statement) -> Result<()> {
        self.state.lock().unwrap().executed.push(statement.clone());
        let key = Self::statement_key(statement);
        self.inject(&key).await?;

        let mut state = self.state.lock().unwrap();
        state.journal.push(key);
        match statement {
            Statement::DisableConstraint { constraint, .. } => {
                state.disabled.insert(constraint.clone());
            }
            Statement::EnableConstraint { constraint, .. } => {
                state.disabled.remove(constraint);
            }
            Statement::DropPartition { table, partition } => {
                state
                    .target_partitions
                    .retain(|p| !(p.table_name == *table && p.partition_name == *partition));
            }
            Statement::AddPartition {
                table,
                partition,
                bound,
            } => {
                state.target_partitions.push(PartitionDescriptor {
                    table_name: table.clone(),
                    partition_name: partition.clone(),
                    high_value: bound.clone(),
                });
            }
            Statement::Truncate { table } => {
                state.target_rows.insert(table.clone(), Vec::new());
            }
            Statement::RefreshView { view } => state.refreshed.push(view.clone()),
        }
        Ok(())
    }

    async fn copy_rows(&self, table: &str) -> Result<u64> {
        self.inject(&format!("copy:{}", table)).await?;

        let blocking = self.state.lock().unwrap().blocking_copies.get(table).copied();
        let state = self.state.clone();
        let table = table.to_string();
        let commit = move || {
            let mut state = state.lock().unwrap();
            let rows = state.source_rows.get(&table).cloned().unwrap_or_default();
            let count = rows.len() as u64;
            state.target_rows.insert(table.clone(), rows);
            state.copies.push(table.clone());
            state.journal.push(format!("copied:{}", table));
            count
        };

        match blocking {
            Some(duration) => tokio::task::spawn_blocking(move || {
                std::thread::sleep(duration);
                commit()
            })
            .await
            .map_err(|e| RefreshError::database("copying on the blocking pool", e)),
            None => Ok(commit()),
        }
    }

    fn target_name(&self) -> &str {
        &self.target
    }
}

/// Audit sink keeping records in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<(AuditLevel, String, String)>>,
}

impl MemoryAuditSink {
    pub fn records(&self) -> Vec<(AuditLevel, String, String)> {
        self.records.lock().unwrap().clone()
    }

    pub fn count(&self, level: AuditLevel) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _, _)| *l == level)
            .count()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, level: AuditLevel, module: &str, message: &str) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .push((level, module.to_string(), message.to_string()));
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

/// Run log store keeping batches in memory.
#[derive(Default)]
pub struct MemoryRunLogStore {
    batches: Mutex<Vec<(String, Vec<LogEntry>)>>,
    fail: bool,
}

impl MemoryRunLogStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<(String, Vec<LogEntry>)> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunLogStore for MemoryRunLogStore {
    async fn append_batch(&self, run_id: &str, entries: &[LogEntry]) -> Result<()> {
        if self.fail {
            return Err(RefreshError::Store("ORA-01653: unable to extend table".into()));
        }
        self.batches
            .lock()
            .unwrap()
            .push((run_id.to_string(), entries.to_vec()));
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

/// Notifier keeping sent reports in memory.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        if self.fail {
            return Err(RefreshError::Store("mail relay unreachable".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}
