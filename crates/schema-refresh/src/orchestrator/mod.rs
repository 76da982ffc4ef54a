//! Refresh orchestrator - main workflow coordinator.
//!
//! Sequences the phases of one run:
//!
//! ```text
//! Pre -> Reconcile -> Sync -> Refresh -> Post -> Report -> Done
//!   \________________________________________________/
//!                      fatal error -> Aborted
//! ```
//!
//! Unit failures are recorded and the run moves on. Only discovery failures,
//! run-log persistence failures and anything escaping unit isolation abort it.

mod sinks;

pub use sinks::Sinks;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::catalog::{CatalogReader, DEFAULT_LOG_TABLE_PREFIX, DEFAULT_SEED_PARTITION_PREFIX};
use crate::config::Config;
use crate::constraints::ConstraintGate;
use crate::core::{
    panic_message, ConstraintDescriptor, Connectivity, RefreshMode, Side, TableDescriptor,
    ViewDescriptor,
};
use crate::drivers::oracle::OracleConnectivity;
use crate::error::{RefreshError, Result};
use crate::partition::{PartitionPlan, PartitionReconciler};
use crate::report::log::{bounded_message, phase, truncate_bytes, LogEntry, MESSAGE_MAX_LEN};
use crate::report::{AuditLevel, RunReport, RunReporter, MAX_REPORTED_FAILURES};
use crate::run::{ReplicationRun, RunOutcome, RunPhase};
use crate::sync::{TableSynchronizer, CANCELLED_BEFORE_START};
use crate::views::ViewRefresher;

/// Upper bound for the backtrace attached to a fatal audit record, in bytes.
pub const BACKTRACE_MAX_LEN: usize = 2000;

const MODULE: &str = module_path!();

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Report identity; defaults to the connectivity's target name.
    pub target_name: Option<String>,
    pub log_table_prefix: String,
    pub seed_partition_prefix: String,
    pub workers: usize,
    pub unit_timeout: Option<Duration>,
    pub max_reported_failures: usize,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            target_name: None,
            log_table_prefix: DEFAULT_LOG_TABLE_PREFIX.to_string(),
            seed_partition_prefix: DEFAULT_SEED_PARTITION_PREFIX.to_string(),
            workers: 1,
            unit_timeout: None,
            max_reported_failures: MAX_REPORTED_FAILURES,
        }
    }
}

impl RefreshOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_name: Some(config.target_name()),
            log_table_prefix: config.refresh.log_table_prefix.clone(),
            seed_partition_prefix: config.refresh.seed_partition_prefix.clone(),
            workers: config.refresh.get_workers(),
            unit_timeout: config.unit_timeout(),
            max_reported_failures: config.refresh.get_max_reported_failures(),
        }
    }
}

/// Everything discovery found, and what reconciliation would do with it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshPlan {
    /// Source tables to truncate and reload, in discovery order.
    pub tables: Vec<TableDescriptor>,

    /// Target foreign keys to disable and re-enable.
    pub constraints: Vec<ConstraintDescriptor>,

    /// Target partitions to drop and add.
    pub partitions: PartitionPlan,

    /// Target demand-mode views to refresh.
    pub views: Vec<ViewDescriptor>,
}

/// Result of a refresh run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Target identity.
    pub target: String,

    pub outcome: RunOutcome,

    /// `Done`, or the phase the run was in when it aborted.
    pub phase: RunPhase,

    /// Tables the sync phase attempted.
    pub tables_attempted: usize,

    /// Tables truncated and reloaded successfully.
    pub tables_synced: usize,

    /// Every recorded failure, in accumulation order.
    pub failures: Vec<LogEntry>,

    /// Summary sent at the end of a completed run.
    pub report: Option<RunReport>,

    /// Error detail of an aborted run.
    pub fatal: Option<String>,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }
}

/// Refresh orchestrator.
pub struct ReplicationOrchestrator {
    conn: Arc<dyn Connectivity>,
    options: RefreshOptions,
    sinks: Sinks,
}

impl ReplicationOrchestrator {
    pub fn new(conn: Arc<dyn Connectivity>, options: RefreshOptions, sinks: Sinks) -> Self {
        Self {
            conn,
            options,
            sinks,
        }
    }

    /// Connect to both Oracle databases and wire sinks from `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let conn = OracleConnectivity::connect(config).await?;
        let sinks = Sinks::from_config(config, &conn)?;
        Ok(Self::new(
            Arc::new(conn),
            RefreshOptions::from_config(config),
            sinks,
        ))
    }

    fn target_name(&self) -> String {
        self.options
            .target_name
            .clone()
            .unwrap_or_else(|| self.conn.target_name().to_string())
    }

    fn catalog(&self) -> CatalogReader {
        CatalogReader::new(self.conn.clone()).with_prefixes(
            self.options.log_table_prefix.clone(),
            self.options.seed_partition_prefix.clone(),
        )
    }

    fn reconciler(&self) -> PartitionReconciler {
        PartitionReconciler::new(self.conn.clone(), self.options.seed_partition_prefix.clone())
            .with_unit_timeout(self.options.unit_timeout)
    }

    /// Discover and reconcile without changing anything.
    pub async fn plan(&self) -> Result<RefreshPlan> {
        let catalog = self.catalog();

        let tables = catalog.list_replicable_tables().await?;
        let constraints = catalog.list_referential_constraints().await?;
        let source_partitions = catalog.list_partitions(Side::Source).await?;
        let target_partitions = catalog.list_partitions(Side::Target).await?;
        let views = catalog.list_demand_views().await?;

        let partitions = self
            .reconciler()
            .reconcile(&source_partitions, &target_partitions);

        Ok(RefreshPlan {
            tables,
            constraints,
            partitions,
            views,
        })
    }

    /// Run a full refresh.
    ///
    /// Never returns an error: a fatal failure yields an `Aborted` result with
    /// `FatalFailure` outcome after one fatal audit record.
    pub async fn run(&self, cancel: Option<CancellationToken>) -> RunResult {
        let cancel = cancel.unwrap_or_else(CancellationToken::new);
        let mut run = ReplicationRun::new(self.target_name());
        let mut stage = RunPhase::Pre;

        info!("Starting refresh run {} for {}", run.run_id, run.target);
        self.audit(
            AuditLevel::Info,
            &format!("begin refresh of {} (run {})", run.target, run.run_id),
        )
        .await;

        install_panic_hook();
        take_panic_backtrace();
        let outcome = AssertUnwindSafe(self.execute(&mut run, &mut stage, &cancel))
            .catch_unwind()
            .await;

        let (report, fatal) = match outcome {
            Ok(Ok(report)) => {
                stage = RunPhase::Done;
                let level = if run.failure_count() == 0 {
                    AuditLevel::Info
                } else {
                    AuditLevel::Warn
                };
                self.audit(
                    level,
                    &format!("end refresh of {}: {}", run.target, report.subject),
                )
                .await;
                (Some(report), None)
            }
            Ok(Err(e)) => {
                let detail = bounded_message(&e.code(), &e.to_string());
                let trace = format!("backtrace (abort site):\n{}", Backtrace::force_capture());
                self.abort(&run, stage, &detail, &trace).await;
                stage = RunPhase::Aborted;
                (None, Some(detail))
            }
            Err(panic) => {
                let detail = bounded_message("REFRESH-PANIC", &panic_message(panic.as_ref()));
                let trace = match take_panic_backtrace() {
                    Some(bt) => format!("backtrace (panic site):\n{}", bt),
                    None => format!("backtrace (abort site):\n{}", Backtrace::force_capture()),
                };
                self.abort(&run, stage, &detail, &trace).await;
                stage = RunPhase::Aborted;
                (None, Some(detail))
            }
        };

        let outcome = if fatal.is_some() {
            RunOutcome::FatalFailure
        } else {
            run.outcome()
        };

        let result = RunResult {
            run_id: run.run_id.clone(),
            target: run.target.clone(),
            outcome,
            phase: stage,
            tables_attempted: run.tables_attempted,
            tables_synced: run.tables_synced,
            failures: run.entries(),
            report,
            fatal,
            started_at: run.started_at,
            completed_at: Utc::now(),
        };

        info!(
            "Refresh {} of {}: {} ({}/{} tables synchronized)",
            result.run_id, result.target, result.outcome, result.tables_synced, result.tables_attempted
        );
        result
    }

    async fn execute(
        &self,
        run: &mut ReplicationRun,
        stage: &mut RunPhase,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let timeout = self.options.unit_timeout;
        let gate = ConstraintGate::new(self.conn.clone()).with_unit_timeout(timeout);

        // Pre: one catalog snapshot for the whole run
        *stage = RunPhase::Pre;
        info!("Phase {}: discovering catalog", stage);
        let plan = self.plan().await?;
        info!(
            "Found {} tables, {} constraints, {} demand views",
            plan.tables.len(),
            plan.constraints.len(),
            plan.views.len()
        );
        let disabled = gate.disable_all(&plan.constraints, &run.log).await;

        *stage = RunPhase::Reconcile;
        info!("Phase {}: reconciling partitions", stage);
        if plan.partitions.is_empty() {
            info!("Partitions already match, no DDL needed");
        } else {
            let reconciler = self.reconciler();
            reconciler.apply_drops(&plan.partitions, &run.log).await;
            reconciler.apply_adds(&plan.partitions, &run.log).await;
        }

        *stage = RunPhase::Sync;
        info!("Phase {}: synchronizing tables", stage);
        let summary = TableSynchronizer::new(self.conn.clone())
            .with_workers(self.options.workers)
            .with_unit_timeout(timeout)
            .sync_all(&plan.tables, &run.log, cancel)
            .await;
        run.tables_attempted = summary.attempted;
        run.tables_synced = summary.succeeded;

        *stage = RunPhase::Refresh;
        if cancel.is_cancelled() {
            warn!("Cancellation requested, skipping materialized view refresh");
            for view in plan.views.iter().filter(|v| v.refresh_mode == RefreshMode::Demand) {
                run.log.record(LogEntry::new(
                    MODULE,
                    Some(&view.name),
                    phase::CANCELLED,
                    &bounded_message(&RefreshError::Cancelled.code(), CANCELLED_BEFORE_START),
                ));
            }
        } else {
            info!("Phase {}: refreshing materialized views", stage);
            ViewRefresher::new(self.conn.clone())
                .with_unit_timeout(timeout)
                .refresh_all(&plan.views, &run.log)
                .await;
        }

        *stage = RunPhase::Post;
        info!("Phase {}: re-enabling constraints", stage);
        let enabled = gate.enable_all(&plan.constraints, &run.log).await;
        debug_assert_eq!(disabled, enabled);

        *stage = RunPhase::Report;
        info!("Phase {}: reporting", stage);
        RunReporter::new(self.sinks.run_log.clone(), self.sinks.notifier.clone())
            .with_max_reported_failures(self.options.max_reported_failures)
            .finalize(run)
            .await
    }

    /// Milestone record; a failure to write it does not affect the run.
    async fn audit(&self, level: AuditLevel, message: &str) {
        if let Err(e) = self.sinks.audit.record(level, MODULE, message).await {
            warn!("Failed to write audit record: {}", e);
        }
    }

    /// Record the single fatal entry for an aborted run.
    async fn abort(&self, run: &ReplicationRun, stage: RunPhase, detail: &str, trace: &str) {
        error!("Refresh run {} aborted in phase {}: {}", run.run_id, stage, detail);

        let backtrace = truncate_bytes(trace, BACKTRACE_MAX_LEN);
        let budget = MESSAGE_MAX_LEN.saturating_sub(BACKTRACE_MAX_LEN + 64);
        let message = format!(
            "run {} aborted in phase {}: {}\n{}",
            run.run_id,
            stage,
            truncate_bytes(detail, budget),
            backtrace
        );
        let message = truncate_bytes(&message, MESSAGE_MAX_LEN);

        run.log
            .record(LogEntry::new(MODULE, None, phase::FATAL, detail));
        if let Err(e) = self
            .sinks
            .audit
            .record(AuditLevel::Fatal, MODULE, message)
            .await
        {
            error!("Failed to write fatal audit record: {}", e);
        }
    }
}

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = RefCell::new(None);
}

static PANIC_HOOK: Once = Once::new();

/// Chain a hook that keeps the backtrace of the latest panic on each thread.
///
/// `catch_unwind` returns on the thread that panicked, so the run reads the
/// slot back on the same thread.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let bt = Backtrace::force_capture().to_string();
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(bt));
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> Option<String> {
    PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Statement;
    use crate::testing::{MemoryAuditSink, MemoryConnectivity, MemoryNotifier, MemoryRunLogStore};

    const JAN: &str = "TO_DATE(' 2024-02-01 00:00:00', 'SYYYY-MM-DD HH24:MI:SS')";
    const FEB: &str = "TO_DATE(' 2024-03-01 00:00:00', 'SYYYY-MM-DD HH24:MI:SS')";

    struct Harness {
        conn: Arc<MemoryConnectivity>,
        audit: Arc<MemoryAuditSink>,
        store: Arc<MemoryRunLogStore>,
        notifier: Arc<MemoryNotifier>,
        orchestrator: ReplicationOrchestrator,
    }

    fn harness(conn: MemoryConnectivity) -> Harness {
        harness_with_store(conn, MemoryRunLogStore::default())
    }

    fn harness_with_store(conn: MemoryConnectivity, store: MemoryRunLogStore) -> Harness {
        harness_with(conn, store, RefreshOptions::default())
    }

    fn harness_with(
        conn: MemoryConnectivity,
        store: MemoryRunLogStore,
        options: RefreshOptions,
    ) -> Harness {
        let conn = Arc::new(conn);
        let audit = Arc::new(MemoryAuditSink::default());
        let store = Arc::new(store);
        let notifier = Arc::new(MemoryNotifier::default());
        let sinks = Sinks {
            audit: audit.clone(),
            run_log: store.clone(),
            notifier: notifier.clone(),
        };
        let orchestrator = ReplicationOrchestrator::new(conn.clone(), options, sinks);
        Harness {
            conn,
            audit,
            store,
            notifier,
            orchestrator,
        }
    }

    fn is_partition_ddl(s: &Statement) -> bool {
        matches!(
            s,
            Statement::DropPartition { .. } | Statement::AddPartition { .. }
        )
    }

    #[tokio::test]
    async fn test_partial_failure_when_one_table_cannot_truncate() {
        let h = harness(
            MemoryConnectivity::new("TEST")
                .with_table("A", &[1, 2, 3])
                .with_table("B", &[4, 5])
                .with_constraint("B", "FK_B_A")
                .fail_on("truncate:B"),
        );

        let result = h.orchestrator.run(None).await;

        assert_eq!(result.outcome, RunOutcome::PartialFailure { failures: 1 });
        assert_eq!(result.phase, RunPhase::Done);
        assert_eq!(h.conn.rows(Side::Target, "A"), h.conn.rows(Side::Source, "A"));
        assert_eq!(h.conn.rows(Side::Target, "B"), vec![-1, -2]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].table_name, "B");
        assert_eq!(result.failures[0].phase, "truncate/insert together");
        assert_eq!(result.tables_attempted, 2);
        assert_eq!(result.tables_synced, 1);

        let report = result.report.unwrap();
        assert_eq!(
            report.subject,
            "Schema refresh TEST: 2 tables processed - COMPLETED, 1 failed"
        );
        assert_eq!(h.store.batches()[0].1.len(), 1);
        assert_eq!(h.notifier.sent().len(), 1);
        assert!(h.conn.disabled_constraints().is_empty());
        assert_eq!(h.audit.count(AuditLevel::Warn), 1);
    }

    #[tokio::test]
    async fn test_identical_partitions_issue_no_ddl() {
        let h = harness(
            MemoryConnectivity::new("TEST")
                .with_table("SALES", &[1])
                .with_partition(Side::Source, "SALES", "P1", JAN)
                .with_partition(Side::Source, "SALES", "P2", FEB)
                .with_partition(Side::Target, "SALES", "P1", JAN)
                .with_partition(Side::Target, "SALES", "P2", FEB),
        );

        let plan = h.orchestrator.plan().await.unwrap();
        assert!(plan.partitions.is_empty());

        let result = h.orchestrator.run(None).await;
        assert_eq!(result.outcome, RunOutcome::FullSuccess);
        assert!(!h.conn.executed().iter().any(is_partition_ddl));
        assert!(result
            .report
            .unwrap()
            .subject
            .ends_with("1 tables processed - FULL SUCCESS"));
    }

    #[tokio::test]
    async fn test_plan_reports_without_mutating() {
        let h = harness(
            MemoryConnectivity::new("TEST")
                .with_table("SALES", &[1, 2])
                .with_table("REFRESH_LOG_RUNS", &[])
                .with_constraint("SALES", "FK_SALES_CUST")
                .with_partition(Side::Source, "SALES", "P2", FEB)
                .with_partition(Side::Target, "SALES", "P0", JAN)
                .with_view("MV_SALES", RefreshMode::Demand),
        );

        let plan = h.orchestrator.plan().await.unwrap();

        let tables: Vec<_> = plan.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["SALES"]);
        assert_eq!(plan.constraints.len(), 1);
        assert_eq!(plan.partitions.drops.len(), 1);
        assert_eq!(plan.partitions.drops[0].partition_name, "P0");
        assert_eq!(plan.partitions.adds.len(), 1);
        assert_eq!(plan.partitions.adds[0].partition_name, "P2");
        assert_eq!(plan.views.len(), 1);

        assert!(h.conn.executed().is_empty());
        assert!(h.conn.copies().is_empty());
        assert!(h.audit.records().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_failure_aborts_before_any_mutation() {
        let h = harness(
            MemoryConnectivity::new("TEST")
                .with_table("A", &[1])
                .with_constraint("A", "FK_A")
                .fail_catalog(Side::Target),
        );

        let result = h.orchestrator.run(None).await;

        assert_eq!(result.outcome, RunOutcome::FatalFailure);
        assert_eq!(result.phase, RunPhase::Aborted);
        assert!(result.report.is_none());
        assert!(result.fatal.as_deref().unwrap().starts_with("ORA-00942"));
        assert!(h.conn.executed().is_empty());
        assert_eq!(h.audit.count(AuditLevel::Fatal), 1);
        assert!(h.store.batches().is_empty());
        assert!(h.notifier.sent().is_empty());

        let fatal = h
            .audit
            .records()
            .into_iter()
            .find(|(level, _, _)| *level == AuditLevel::Fatal)
            .unwrap();
        assert!(fatal.2.contains("aborted in phase PRE"));
        assert!(fatal.2.contains("backtrace (abort site):"));
        assert!(fatal.2.len() <= MESSAGE_MAX_LEN);
    }

    #[tokio::test]
    async fn test_reenable_attempted_for_every_disabled_constraint() {
        let h = harness(
            MemoryConnectivity::new("TEST")
                .with_table("A", &[1])
                .with_constraint("A", "FK_1")
                .with_constraint("A", "FK_2")
                .with_constraint("B", "FK_3")
                .fail_on("disable:FK_2")
                .fail_on("copy:A"),
        );

        h.orchestrator.run(None).await;

        let executed = h.conn.executed();
        let disables = executed
            .iter()
            .filter(|s| matches!(s, Statement::DisableConstraint { .. }))
            .count();
        let enables = executed
            .iter()
            .filter(|s| matches!(s, Statement::EnableConstraint { .. }))
            .count();
        assert_eq!(disables, 3);
        assert_eq!(enables, 3);

        // Every enable happens after the last sync statement.
        let last_truncate = executed
            .iter()
            .rposition(|s| matches!(s, Statement::Truncate { .. }))
            .unwrap();
        let first_enable = executed
            .iter()
            .position(|s| matches!(s, Statement::EnableConstraint { .. }))
            .unwrap();
        assert!(first_enable > last_truncate);
    }

    #[tokio::test]
    async fn test_full_run_reconciles_and_refreshes() {
        let h = harness(
            MemoryConnectivity::new("TEST")
                .with_table("SALES", &[1, 2])
                .with_partition(Side::Source, "SALES", "P_INIT", "MAXVALUE")
                .with_partition(Side::Source, "SALES", "P2", FEB)
                .with_partition(Side::Target, "SALES", "P_INIT", "MAXVALUE")
                .with_partition(Side::Target, "SALES", "P0", JAN)
                .with_view("MV_SALES", RefreshMode::Demand)
                .with_view("MV_LIVE", RefreshMode::Commit),
        );

        let result = h.orchestrator.run(None).await;

        assert_eq!(result.outcome, RunOutcome::FullSuccess);
        let target: Vec<_> = h
            .conn
            .partitions(Side::Target)
            .into_iter()
            .map(|p| p.partition_name)
            .collect();
        assert_eq!(target, vec!["P_INIT", "P2"]);
        assert_eq!(h.conn.refreshed_views(), vec!["MV_SALES"]);
        assert_eq!(h.audit.count(AuditLevel::Info), 2);
        assert_eq!(h.audit.count(AuditLevel::Fatal), 0);
    }

    #[tokio::test]
    async fn test_run_log_persistence_failure_is_fatal() {
        let h = harness_with_store(
            MemoryConnectivity::new("TEST")
                .with_table("A", &[1])
                .fail_on("copy:A"),
            MemoryRunLogStore::failing(),
        );

        let result = h.orchestrator.run(None).await;

        assert_eq!(result.outcome, RunOutcome::FatalFailure);
        assert_eq!(result.phase, RunPhase::Aborted);
        assert!(result.fatal.unwrap().contains("unable to extend"));
        assert_eq!(h.audit.count(AuditLevel::Fatal), 1);
    }

    #[tokio::test]
    async fn test_panic_outside_units_aborts_run() {
        let h = harness(
            MemoryConnectivity::new("TEST")
                .with_table("A", &[1])
                .with_constraint("A", "FK_A")
                .panic_catalog(Side::Source),
        );

        let result = h.orchestrator.run(None).await;

        assert_eq!(result.outcome, RunOutcome::FatalFailure);
        assert!(result.fatal.unwrap().contains("injected panic reading source catalog"));
        assert_eq!(h.audit.count(AuditLevel::Fatal), 1);
        assert_eq!(result.failures.last().unwrap().phase, "fatal");
        assert!(h.conn.executed().is_empty());

        let fatal = h
            .audit
            .records()
            .into_iter()
            .find(|(level, _, _)| *level == AuditLevel::Fatal)
            .unwrap();
        assert!(fatal.2.contains("backtrace (panic site):"));
    }

    #[tokio::test]
    async fn test_panicking_constraint_does_not_stop_reenable() {
        let h = harness(
            MemoryConnectivity::new("TEST")
                .with_table("A", &[1])
                .with_constraint("A", "FK_1")
                .with_constraint("A", "FK_2")
                .with_constraint("A", "FK_3")
                .panic_on("enable:FK_1"),
        );

        let result = h.orchestrator.run(None).await;

        assert_eq!(result.outcome, RunOutcome::PartialFailure { failures: 1 });
        assert_eq!(result.phase, RunPhase::Done);
        assert_eq!(h.conn.disabled_constraints(), vec!["FK_1"]);
        assert_eq!(result.failures[0].phase, "enable constraints");
        assert!(result.failures[0].message.contains("injected panic at enable:FK_1"));
        assert_eq!(h.audit.count(AuditLevel::Fatal), 0);
    }

    #[tokio::test]
    async fn test_timed_out_copy_settles_before_reenable() {
        let options = RefreshOptions {
            unit_timeout: Some(Duration::from_millis(100)),
            ..RefreshOptions::default()
        };
        let h = harness_with(
            MemoryConnectivity::new("TEST")
                .with_table("BIG", &[1, 2, 3])
                .with_constraint("BIG", "FK_BIG")
                .blocking_copy("BIG", Duration::from_millis(400)),
            MemoryRunLogStore::default(),
            options,
        );

        let result = h.orchestrator.run(None).await;

        let journal = h.conn.journal();
        let copied = journal.iter().position(|e| e == "copied:BIG").unwrap();
        let enabled = journal.iter().position(|e| e == "enable:FK_BIG").unwrap();
        assert!(copied < enabled, "{:?}", journal);

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].table_name, "BIG");
        assert!(result.failures[0].message.contains("completed late and was committed"));
        assert_eq!(h.conn.rows(Side::Target, "BIG"), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cancelled_run_still_reenables_constraints() {
        let h = harness(
            MemoryConnectivity::new("TEST")
                .with_table("A", &[1])
                .with_table("B", &[2])
                .with_constraint("B", "FK_B")
                .with_view("MV", RefreshMode::Demand),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = h.orchestrator.run(Some(cancel)).await;

        assert_eq!(result.outcome, RunOutcome::PartialFailure { failures: 3 });
        assert!(h.conn.copies().is_empty());
        assert!(h.conn.refreshed_views().is_empty());
        assert!(h.conn.disabled_constraints().is_empty());
        assert!(result
            .failures
            .iter()
            .all(|e| e.message.ends_with("cancelled before start")));
        assert!(result.failures.iter().all(|e| e.phase == phase::CANCELLED));
        assert!(!result.report.unwrap().body.contains("left empty"));
    }

    #[tokio::test]
    async fn test_result_serializes_to_json() {
        let h = harness(MemoryConnectivity::new("TEST").with_table("A", &[1]));
        let result = h.orchestrator.run(None).await;

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["outcome"]["status"], "full_success");
        assert_eq!(json["phase"], "done");
        assert_eq!(json["tables_synced"], 1);
    }
}
