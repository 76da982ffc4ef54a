//! Source and target sessions behind the [`Connectivity`] seam.

use async_trait::async_trait;
use tracing::info;

use super::catalog;
use super::dialect::OracleDialect;
use super::session::{create_environment, fetch_text_rows, in_transaction, OdbcSession};
use crate::config::Config;
use crate::core::{
    ConstraintDescriptor, Connectivity, Dialect, PartitionDescriptor, Side, Statement,
    TableDescriptor, ViewDescriptor,
};
use crate::error::Result;

/// Oracle source and target reached over ODBC.
///
/// Bulk copies run on the target session, reading the source through
/// `db_link` when the two schemas live in different instances.
pub struct OracleConnectivity {
    source: OdbcSession,
    target: OdbcSession,
    dialect: OracleDialect,
    source_schema: String,
    target_schema: String,
    db_link: Option<String>,
    target_name: String,
}

impl OracleConnectivity {
    /// Open and verify both sessions.
    pub async fn connect(config: &Config) -> Result<Self> {
        let env = create_environment()?;
        let source = OdbcSession::connect(
            env.clone(),
            config.source.connection_string(),
            format!(
                "source {}:{}/{}",
                config.source.host, config.source.port, config.source.service_name
            ),
        )
        .await?;
        let target = OdbcSession::connect(
            env,
            config.target.connection_string(),
            format!(
                "target {}:{}/{}",
                config.target.host, config.target.port, config.target.service_name
            ),
        )
        .await?;

        info!(
            "Refreshing {}.{} from {}.{}{}",
            config.target.service_name,
            config.target.schema,
            config.source.service_name,
            config.source.schema,
            config
                .target
                .db_link
                .as_deref()
                .map(|l| format!(" via @{}", l))
                .unwrap_or_default()
        );

        Ok(Self {
            source,
            target,
            dialect: OracleDialect::new(),
            source_schema: config.source.schema.clone(),
            target_schema: config.target.schema.clone(),
            db_link: config.target.db_link.clone(),
            target_name: config.target_name(),
        })
    }

    /// Target session, for sinks writing to the target schema.
    pub fn target_session(&self) -> &OdbcSession {
        &self.target
    }

    pub fn target_schema(&self) -> &str {
        &self.target_schema
    }

    fn side(&self, side: Side) -> (&OdbcSession, &str) {
        match side {
            Side::Source => (&self.source, &self.source_schema),
            Side::Target => (&self.target, &self.target_schema),
        }
    }
}

#[async_trait]
impl Connectivity for OracleConnectivity {
    async fn fetch_tables(&self, side: Side) -> Result<Vec<TableDescriptor>> {
        let (session, schema) = self.side(side);
        let rows = session
            .query("listing tables", catalog::tables_query(schema))
            .await?;
        catalog::decode_tables(rows)
    }

    async fn fetch_partitions(&self, side: Side) -> Result<Vec<PartitionDescriptor>> {
        let (session, schema) = self.side(side);
        let rows = session
            .query("listing partitions", catalog::partitions_query(schema))
            .await?;
        catalog::decode_partitions(rows)
    }

    async fn fetch_referential_constraints(
        &self,
        side: Side,
    ) -> Result<Vec<ConstraintDescriptor>> {
        let (session, schema) = self.side(side);
        let rows = session
            .query("listing constraints", catalog::constraints_query(schema))
            .await?;
        catalog::decode_constraints(rows)
    }

    async fn fetch_materialized_views(&self, side: Side) -> Result<Vec<ViewDescriptor>> {
        let (session, schema) = self.side(side);
        let rows = session
            .query("listing materialized views", catalog::views_query(schema))
            .await?;
        catalog::decode_views(rows)
    }

    async fn execute(&self, statement: &Statement) -> Result<()> {
        let sql = self.dialect.render(&self.target_schema, statement);
        self.target.execute(&statement.to_string(), sql).await
    }

    async fn copy_rows(&self, table: &str) -> Result<u64> {
        let copy = self.dialect.build_copy(
            &self.target_schema,
            &self.source_schema,
            table,
            self.db_link.as_deref(),
        );
        let count = self.dialect.build_count(&self.target_schema, table);

        self.target
            .with_connection(&format!("copying {}", table), move |conn| {
                in_transaction(conn, |conn| {
                    conn.execute(&copy, ())?;
                    Ok(())
                })?;
                catalog::decode_count(fetch_text_rows(conn, &count)?)
            })
            .await
    }

    fn target_name(&self) -> &str {
        &self.target_name
    }
}
