//! Core traits for store-agnostic schema refresh.
//!
//! - [`Connectivity`]: catalog reads on either side, target execution, bulk copy
//! - [`Dialect`]: SQL rendering strategy for a database engine
//!
//! Every engine component receives an `Arc<dyn Connectivity>` explicitly; the
//! target identity lives inside the implementation and is never spliced into
//! statements by the engine.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{
    ConstraintDescriptor, PartitionDescriptor, Side, TableDescriptor, ViewDescriptor,
};
use super::statement::Statement;

/// Access to the source and target stores.
///
/// Catalog methods return raw catalog content; filtering (temporary tables,
/// log tables, seed partitions, refresh modes) is the engine's job.
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// All tables of the schema on `side`, in catalog order.
    async fn fetch_tables(&self, side: Side) -> Result<Vec<TableDescriptor>>;

    /// All table partitions of the schema on `side`.
    async fn fetch_partitions(&self, side: Side) -> Result<Vec<PartitionDescriptor>>;

    /// Referential constraints declared in the schema on `side`.
    async fn fetch_referential_constraints(&self, side: Side)
        -> Result<Vec<ConstraintDescriptor>>;

    /// Materialized views of the schema on `side`.
    async fn fetch_materialized_views(&self, side: Side) -> Result<Vec<ViewDescriptor>>;

    /// Execute one schema-mutating statement on the target.
    async fn execute(&self, statement: &Statement) -> Result<()>;

    /// Copy every row of `table` from source to target and commit.
    ///
    /// Returns the number of rows now present in the target table.
    async fn copy_rows(&self, table: &str) -> Result<u64>;

    /// Identity of the target, used in reports and audit messages.
    fn target_name(&self) -> &str;
}

/// SQL syntax strategy for a database engine.
pub trait Dialect: Send + Sync {
    /// Quote an identifier (table, partition, constraint name).
    fn quote_ident(&self, name: &str) -> String;

    /// Render a statement against `schema`.
    fn render(&self, schema: &str, statement: &Statement) -> String;

    /// Build the bulk copy of one table.
    ///
    /// `db_link` names the transport from the target session to the source
    /// when the two schemas live in different instances.
    fn build_copy(
        &self,
        target_schema: &str,
        source_schema: &str,
        table: &str,
        db_link: Option<&str>,
    ) -> String;

    /// Build a row count query.
    fn build_count(&self, schema: &str, table: &str) -> String;
}
