//! Audit sink and run-log store backed by tables in the target schema.
//!
//! Each write opens its own connection, so audit records commit regardless of
//! what the refresh itself has in flight.

use async_trait::async_trait;
use odbc_api::IntoParameter;
use tracing::debug;

use super::dialect::OracleDialect;
use super::session::{in_transaction, OdbcSession};
use crate::core::Dialect;
use crate::error::{RefreshError, Result};
use crate::report::log::{truncate_bytes, MESSAGE_MAX_LEN};
use crate::report::{AuditLevel, AuditSink, LogEntry, RunLogStore};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Audit table:
/// `(LOGGED_AT TIMESTAMP, AUDIT_LEVEL VARCHAR2(10), MODULE_NAME VARCHAR2(200), MESSAGE VARCHAR2(4000))`
pub struct OracleAuditSink {
    session: OdbcSession,
    insert_sql: String,
}

impl OracleAuditSink {
    pub fn new(session: OdbcSession, schema: &str, table: &str) -> Self {
        let dialect = OracleDialect::new();
        let insert_sql = format!(
            "INSERT INTO {}.{} (LOGGED_AT, AUDIT_LEVEL, MODULE_NAME, MESSAGE) \
             VALUES (SYSTIMESTAMP, ?, ?, ?)",
            dialect.quote_ident(schema),
            dialect.quote_ident(table)
        );
        Self {
            session,
            insert_sql,
        }
    }
}

#[async_trait]
impl AuditSink for OracleAuditSink {
    async fn record(&self, level: AuditLevel, module: &str, message: &str) -> Result<()> {
        let sql = self.insert_sql.clone();
        let level = level.as_str().to_string();
        let module = module.to_string();
        let message = truncate_bytes(message, MESSAGE_MAX_LEN).to_string();

        self.session
            .with_connection("writing audit record", move |conn| {
                conn.execute(
                    &sql,
                    (
                        &level.as_str().into_parameter(),
                        &module.as_str().into_parameter(),
                        &message.as_str().into_parameter(),
                    ),
                )?;
                Ok(())
            })
            .await
            .map_err(|e| RefreshError::Store(e.to_string()))
    }

    fn backend_type(&self) -> &'static str {
        "database"
    }
}

/// Run-log table:
/// `(RUN_ID VARCHAR2(36), LOGGED_AT TIMESTAMP, PROCEDURE_NAME VARCHAR2(200),
///   TABLE_NAME VARCHAR2(128), PHASE VARCHAR2(50), MESSAGE VARCHAR2(4000))`
pub struct OracleRunLogStore {
    session: OdbcSession,
    insert_sql: String,
}

impl OracleRunLogStore {
    pub fn new(session: OdbcSession, schema: &str, table: &str) -> Self {
        let dialect = OracleDialect::new();
        let insert_sql = format!(
            "INSERT INTO {}.{} (RUN_ID, LOGGED_AT, PROCEDURE_NAME, TABLE_NAME, PHASE, MESSAGE) \
             VALUES (?, TO_TIMESTAMP(?, 'YYYY-MM-DD HH24:MI:SS.FF6'), ?, ?, ?, ?)",
            dialect.quote_ident(schema),
            dialect.quote_ident(table)
        );
        Self {
            session,
            insert_sql,
        }
    }
}

#[async_trait]
impl RunLogStore for OracleRunLogStore {
    async fn append_batch(&self, run_id: &str, entries: &[LogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let sql = self.insert_sql.clone();
        let run_id = run_id.to_string();
        let entries = entries.to_vec();
        let count = entries.len();

        self.session
            .with_connection("persisting run log", move |conn| {
                in_transaction(conn, |conn| {
                    for entry in &entries {
                        let logged_at = entry.timestamp.format(TIMESTAMP_FORMAT).to_string();
                        conn.execute(
                            &sql,
                            (
                                &run_id.as_str().into_parameter(),
                                &logged_at.as_str().into_parameter(),
                                &entry.procedure_name.as_str().into_parameter(),
                                &entry.table_name.as_str().into_parameter(),
                                &entry.phase.as_str().into_parameter(),
                                &entry.message.as_str().into_parameter(),
                            ),
                        )?;
                    }
                    Ok(())
                })
            })
            .await
            .map_err(|e| RefreshError::Store(e.to_string()))?;

        debug!("Inserted {} run log rows", count);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "database"
    }
}
