//! Oracle SQL dialect (Strategy pattern).
//!
//! Renders [`Statement`]s and bulk copies into Oracle DDL/DML.

use crate::core::statement::Statement;
use crate::core::traits::Dialect;

/// Oracle dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct OracleDialect;

impl OracleDialect {
    /// Create a new Oracle dialect instance.
    pub fn new() -> Self {
        Self
    }

    fn qualified(&self, schema: &str, name: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(name))
    }
}

impl Dialect for OracleDialect {
    fn quote_ident(&self, name: &str) -> String {
        // Quoted identifiers keep the exact catalog case
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn render(&self, schema: &str, statement: &Statement) -> String {
        match statement {
            Statement::DisableConstraint { table, constraint } => format!(
                "ALTER TABLE {} DISABLE CONSTRAINT {}",
                self.qualified(schema, table),
                self.quote_ident(constraint)
            ),
            Statement::EnableConstraint { table, constraint } => format!(
                "ALTER TABLE {} ENABLE CONSTRAINT {}",
                self.qualified(schema, table),
                self.quote_ident(constraint)
            ),
            Statement::DropPartition { table, partition } => format!(
                "ALTER TABLE {} DROP PARTITION {} UPDATE GLOBAL INDEXES",
                self.qualified(schema, table),
                self.quote_ident(partition)
            ),
            Statement::AddPartition {
                table,
                partition,
                bound,
            } => format!(
                "ALTER TABLE {} ADD PARTITION {} {}",
                self.qualified(schema, table),
                self.quote_ident(partition),
                bound.values_clause()
            ),
            Statement::Truncate { table } => {
                format!("TRUNCATE TABLE {}", self.qualified(schema, table))
            }
            Statement::RefreshView { view } => format!(
                "BEGIN DBMS_MVIEW.REFRESH('{}'); END;",
                self.qualified(schema, view).replace('\'', "''")
            ),
        }
    }

    fn build_copy(
        &self,
        target_schema: &str,
        source_schema: &str,
        table: &str,
        db_link: Option<&str>,
    ) -> String {
        let link = db_link.map(|l| format!("@{}", l)).unwrap_or_default();
        format!(
            "INSERT /*+ APPEND */ INTO {} SELECT * FROM {}{}",
            self.qualified(target_schema, table),
            self.qualified(source_schema, table),
            link
        )
    }

    fn build_count(&self, schema: &str, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", self.qualified(schema, table))
    }
}
