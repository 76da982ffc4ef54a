//! Catalog discovery on source and target.
//!
//! Read-only. Every failure is reported as [`RefreshError::Catalog`], which
//! the orchestrator treats as fatal before any mutation happens.

use std::sync::Arc;
use tracing::debug;

use crate::core::{
    ConstraintDescriptor, Connectivity, PartitionDescriptor, RefreshMode, Side, TableDescriptor,
    ViewDescriptor,
};
use crate::error::{RefreshError, Result};

/// Default name prefix of the engine's own log tables.
pub const DEFAULT_LOG_TABLE_PREFIX: &str = "REFRESH_LOG";

/// Default name prefix of seed partitions that are never reconciled.
pub const DEFAULT_SEED_PARTITION_PREFIX: &str = "P_INIT";

/// Reads and filters catalog metadata.
pub struct CatalogReader {
    conn: Arc<dyn Connectivity>,
    log_table_prefix: String,
    seed_partition_prefix: String,
}

impl CatalogReader {
    pub fn new(conn: Arc<dyn Connectivity>) -> Self {
        Self {
            conn,
            log_table_prefix: DEFAULT_LOG_TABLE_PREFIX.to_string(),
            seed_partition_prefix: DEFAULT_SEED_PARTITION_PREFIX.to_string(),
        }
    }

    pub fn with_prefixes(
        mut self,
        log_table_prefix: impl Into<String>,
        seed_partition_prefix: impl Into<String>,
    ) -> Self {
        self.log_table_prefix = log_table_prefix.into();
        self.seed_partition_prefix = seed_partition_prefix.into();
        self
    }

    pub fn seed_partition_prefix(&self) -> &str {
        &self.seed_partition_prefix
    }

    /// Referential constraints on the target, ordered by table then name.
    pub async fn list_referential_constraints(&self) -> Result<Vec<ConstraintDescriptor>> {
        let mut constraints = self
            .conn
            .fetch_referential_constraints(Side::Target)
            .await
            .map_err(|e| catalog_error(Side::Target, "referential constraints", e))?;
        constraints.sort_by(|a, b| {
            (&a.table_name, &a.constraint_name).cmp(&(&b.table_name, &b.constraint_name))
        });
        debug!("Found {} referential constraints on target", constraints.len());
        Ok(constraints)
    }

    /// Partitions on `side`, seed partitions excluded.
    pub async fn list_partitions(&self, side: Side) -> Result<Vec<PartitionDescriptor>> {
        let partitions = self
            .conn
            .fetch_partitions(side)
            .await
            .map_err(|e| catalog_error(side, "partitions", e))?;
        let total = partitions.len();
        let partitions: Vec<_> = partitions
            .into_iter()
            .filter(|p| !p.is_seed(&self.seed_partition_prefix))
            .collect();
        debug!(
            "Found {} partitions on {} ({} seed partitions skipped)",
            partitions.len(),
            side,
            total - partitions.len()
        );
        Ok(partitions)
    }

    /// Source tables to replicate, in catalog order.
    ///
    /// Temporary tables, materialized view containers and the engine's own
    /// log tables are excluded.
    pub async fn list_replicable_tables(&self) -> Result<Vec<TableDescriptor>> {
        let tables = self
            .conn
            .fetch_tables(Side::Source)
            .await
            .map_err(|e| catalog_error(Side::Source, "tables", e))?;
        let tables: Vec<_> = tables
            .into_iter()
            .filter(|t| !t.is_temporary && !t.is_materialized_view && !self.is_log_table(&t.name))
            .collect();
        debug!("Found {} replicable tables on source", tables.len());
        Ok(tables)
    }

    /// Demand-mode materialized views on the target.
    pub async fn list_demand_views(&self) -> Result<Vec<ViewDescriptor>> {
        let views = self
            .conn
            .fetch_materialized_views(Side::Target)
            .await
            .map_err(|e| catalog_error(Side::Target, "materialized views", e))?;
        Ok(views
            .into_iter()
            .filter(|v| v.refresh_mode == RefreshMode::Demand)
            .collect())
    }

    fn is_log_table(&self, name: &str) -> bool {
        !self.log_table_prefix.is_empty()
            && name
                .to_ascii_uppercase()
                .starts_with(&self.log_table_prefix.to_ascii_uppercase())
    }
}

fn catalog_error(side: Side, what: &str, e: RefreshError) -> RefreshError {
    match e {
        RefreshError::Catalog { .. } => e,
        other => RefreshError::catalog(side, format!("listing {}: {}", what, other)),
    }
}
