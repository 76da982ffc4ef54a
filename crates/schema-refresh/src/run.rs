//! Run-scoped state: the transient aggregate of one refresh invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::report::{LogEntry, RunLog};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Discovery and constraint disable.
    Pre,
    Reconcile,
    Sync,
    Refresh,
    /// Constraint re-enable.
    Post,
    Report,
    Done,
    Aborted,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Pre => "PRE",
            RunPhase::Reconcile => "RECONCILE",
            RunPhase::Sync => "SYNC",
            RunPhase::Refresh => "REFRESH",
            RunPhase::Post => "POST",
            RunPhase::Report => "REPORT",
            RunPhase::Done => "DONE",
            RunPhase::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    FullSuccess,
    PartialFailure { failures: usize },
    FatalFailure,
}

impl RunOutcome {
    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::FullSuccess => 0,
            RunOutcome::PartialFailure { .. } => 2,
            RunOutcome::FatalFailure => 1,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::FullSuccess => f.write_str("FULL SUCCESS"),
            RunOutcome::PartialFailure { failures } => {
                write!(f, "COMPLETED, {} failed", failures)
            }
            RunOutcome::FatalFailure => f.write_str("ABORTED"),
        }
    }
}

/// One refresh invocation. Never persisted; only its log entries are.
#[derive(Debug)]
pub struct ReplicationRun {
    /// Unique run identifier.
    pub run_id: String,

    /// Target identity.
    pub target: String,

    pub started_at: DateTime<Utc>,

    /// Failures recorded by every phase.
    pub log: Arc<RunLog>,

    /// Tables the sync phase attempted.
    pub tables_attempted: usize,

    /// Tables truncated and reloaded successfully.
    pub tables_synced: usize,
}

impl ReplicationRun {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            target: target.into(),
            started_at: Utc::now(),
            log: Arc::new(RunLog::new()),
            tables_attempted: 0,
            tables_synced: 0,
        }
    }

    pub fn failure_count(&self) -> usize {
        self.log.len()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    /// Outcome of a run that reached the report phase.
    pub fn outcome(&self) -> RunOutcome {
        match self.failure_count() {
            0 => RunOutcome::FullSuccess,
            failures => RunOutcome::PartialFailure { failures },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::log::phase;

    #[test]
    fn test_outcome_follows_failure_count() {
        let run = ReplicationRun::new("TEST");
        assert_eq!(run.outcome(), RunOutcome::FullSuccess);

        run.log
            .record(LogEntry::new("p", Some("B"), phase::TRUNCATE_INSERT, "x"));
        assert_eq!(run.outcome(), RunOutcome::PartialFailure { failures: 1 });
    }

    #[test]
    fn test_outcome_display_and_exit_codes() {
        assert_eq!(RunOutcome::FullSuccess.to_string(), "FULL SUCCESS");
        assert_eq!(
            RunOutcome::PartialFailure { failures: 3 }.to_string(),
            "COMPLETED, 3 failed"
        );
        assert_eq!(RunOutcome::FullSuccess.exit_code(), 0);
        assert_eq!(RunOutcome::PartialFailure { failures: 1 }.exit_code(), 2);
        assert_eq!(RunOutcome::FatalFailure.exit_code(), 1);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(ReplicationRun::new("T").run_id, ReplicationRun::new("T").run_id);
    }
}
