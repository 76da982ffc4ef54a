//! Target-side mutations as typed values.
//!
//! The engine never builds SQL text itself. It hands a [`Statement`] to the
//! connectivity, whose [`Dialect`](super::traits::Dialect) renders it against
//! the configured target schema.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::BoundaryExpr;

/// A single schema-mutating operation against the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Statement {
    DisableConstraint { table: String, constraint: String },
    EnableConstraint { table: String, constraint: String },
    DropPartition { table: String, partition: String },
    AddPartition {
        table: String,
        partition: String,
        bound: BoundaryExpr,
    },
    Truncate { table: String },
    RefreshView { view: String },
}

impl Statement {
    /// Table (or view) the statement operates on.
    pub fn object_name(&self) -> &str {
        match self {
            Statement::DisableConstraint { table, .. }
            | Statement::EnableConstraint { table, .. }
            | Statement::DropPartition { table, .. }
            | Statement::AddPartition { table, .. }
            | Statement::Truncate { table } => table,
            Statement::RefreshView { view } => view,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::DisableConstraint { table, constraint } => {
                write!(f, "disable constraint {} on {}", constraint, table)
            }
            Statement::EnableConstraint { table, constraint } => {
                write!(f, "enable constraint {} on {}", constraint, table)
            }
            Statement::DropPartition { table, partition } => {
                write!(f, "drop partition {}.{}", table, partition)
            }
            Statement::AddPartition {
                table,
                partition,
                bound,
            } => write!(
                f,
                "add partition {}.{} {}",
                table,
                partition,
                bound.values_clause()
            ),
            Statement::Truncate { table } => write!(f, "truncate {}", table),
            Statement::RefreshView { view } => write!(f, "refresh materialized view {}", view),
        }
    }
}
