//! Blocking ODBC sessions driven from async code.
//!
//! ODBC calls block, so every operation runs on the blocking pool with a
//! fresh connection from the shared environment.

use odbc_api::{buffers::TextRowSet, Connection, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{RefreshError, Result};

/// Rows fetched as text, `None` for NULL.
pub type TextRows = Vec<Vec<Option<String>>>;

/// Escape a SQL string literal value to prevent SQL injection.
/// Doubles single quotes: `O'Brien` -> `O''Brien`
pub fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Create the process-wide ODBC environment.
pub fn create_environment() -> Result<Arc<Environment>> {
    let env = Environment::new().map_err(|e| {
        RefreshError::database(
            "creating ODBC environment",
            format!(
                "{}. Make sure unixODBC and the Oracle ODBC driver are installed.",
                e
            ),
        )
    })?;
    Ok(Arc::new(env))
}

/// Connection factory for one database.
#[derive(Clone)]
pub struct OdbcSession {
    env: Arc<Environment>,
    connection_string: String,
    label: String,
}

impl OdbcSession {
    /// Create a session and verify that a connection can be opened.
    pub async fn connect(
        env: Arc<Environment>,
        connection_string: String,
        label: impl Into<String>,
    ) -> Result<Self> {
        let session = Self {
            env,
            connection_string,
            label: label.into(),
        };
        session
            .with_connection("verifying connection", |conn| {
                conn.execute("SELECT 1 FROM DUAL", ())?;
                Ok(())
            })
            .await?;
        info!("Connected to {} via ODBC", session.label);
        Ok(session)
    }

    /// Run `f` against a fresh connection on the blocking pool.
    pub async fn with_connection<T, F>(&self, context: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection<'_>) -> Result<T> + Send + 'static,
    {
        let env = self.env.clone();
        let connection_string = self.connection_string.clone();
        let label = self.label.clone();
        let context = context.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = env
                .connect_with_connection_string(&connection_string, ConnectionOptions::default())
                .map_err(|e| RefreshError::database(format!("connecting to {}", label), e))?;
            f(&conn).map_err(|e| match e {
                RefreshError::Database { message, .. } => {
                    RefreshError::database(format!("{} on {}", context, label), message)
                }
                other => other,
            })
        })
        .await
        .map_err(|e| RefreshError::database("running ODBC task", e))?
    }

    /// Run a query and return all rows as text.
    pub async fn query(&self, context: &str, sql: String) -> Result<TextRows> {
        debug!("{}: {}", self.label, sql);
        self.with_connection(context, move |conn| fetch_text_rows(conn, &sql))
            .await
    }

    /// Execute one statement in autocommit mode.
    pub async fn execute(&self, context: &str, sql: String) -> Result<()> {
        debug!("{}: {}", self.label, sql);
        self.with_connection(context, move |conn| {
            conn.execute(&sql, ())?;
            Ok(())
        })
        .await
    }
}

/// Run `f` with autocommit off; commit on success, roll back on failure.
pub fn in_transaction<T>(
    conn: &Connection<'_>,
    f: impl FnOnce(&Connection<'_>) -> Result<T>,
) -> Result<T> {
    conn.set_autocommit(false)?;
    match f(conn) {
        Ok(value) => {
            conn.commit()?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.rollback();
            Err(e)
        }
    }
}

/// Fetch every row of `sql` as text.
pub fn fetch_text_rows(conn: &Connection<'_>, sql: &str) -> Result<TextRows> {
    let mut rows = Vec::new();

    if let Some(mut cursor) = conn.execute(sql, ())? {
        let num_cols = cursor.num_result_cols()? as usize;

        // HIGH_VALUE is a LONG; 4000 covers any partition bound we replay
        let mut buffers = TextRowSet::for_cursor(500, &mut cursor, Some(4000))?;
        let mut row_cursor = cursor.bind_buffer(&mut buffers)?;

        while let Some(batch) = row_cursor.fetch()? {
            for row_idx in 0..batch.num_rows() {
                let mut row = Vec::with_capacity(num_cols);
                for col_idx in 0..num_cols {
                    let value = batch
                        .at(col_idx, row_idx)
                        .map(|bytes| String::from_utf8_lossy(bytes).to_string());
                    row.push(value);
                }
                rows.push(row);
            }
        }
    }

    Ok(rows)
}
