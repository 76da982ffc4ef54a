//! Catalog metadata types for tables, partitions, constraints and views.
//!
//! These are discovered fresh on every run and never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the refresh a catalog query addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The environment being copied from.
    Source,
    /// The environment being refreshed.
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Target => f.write_str("target"),
        }
    }
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name as stored in the catalog.
    pub name: String,

    /// Global/private temporary table.
    pub is_temporary: bool,

    /// Container table of a materialized view.
    pub is_materialized_view: bool,
}

impl TableDescriptor {
    /// A plain, permanent table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_temporary: false,
            is_materialized_view: false,
        }
    }
}

/// Partition upper boundary, classified by the syntax of its expression.
///
/// Range partitions on date keys report boundaries such as
/// `TO_DATE(' 2024-02-01 00:00:00', 'SYYYY-MM-DD HH24:MI:SS', ...)`, list
/// partitions report the raw literal list (`'EU', 'US'`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "expr", rename_all = "snake_case")]
pub enum BoundaryExpr {
    /// Date-valued range boundary; rendered as `VALUES LESS THAN (...)`.
    DateRange(String),
    /// Literal list; rendered as `VALUES (...)`.
    LiteralList(String),
}

/// Prefixes that mark a boundary as a date-valued expression.
const DATE_EXPR_PREFIXES: &[&str] = &[
    "TO_DATE(",
    "TO_TIMESTAMP",
    "TIMESTAMP'",
    "TIMESTAMP '",
    "DATE'",
    "DATE '",
];

impl BoundaryExpr {
    /// Classify a raw catalog boundary expression.
    pub fn parse(raw: &str) -> Self {
        let expr = raw.trim();
        let upper = expr.to_ascii_uppercase();
        if DATE_EXPR_PREFIXES.iter().any(|p| upper.starts_with(p)) {
            BoundaryExpr::DateRange(expr.to_string())
        } else {
            BoundaryExpr::LiteralList(expr.to_string())
        }
    }

    /// The expression text as reported by the catalog (trimmed).
    pub fn expr(&self) -> &str {
        match self {
            BoundaryExpr::DateRange(e) | BoundaryExpr::LiteralList(e) => e,
        }
    }

    /// Whether the boundary is a date-range expression.
    pub fn is_date_range(&self) -> bool {
        matches!(self, BoundaryExpr::DateRange(_))
    }

    /// Boundary clause for an `ADD PARTITION` statement.
    pub fn values_clause(&self) -> String {
        match self {
            BoundaryExpr::DateRange(e) => format!("VALUES LESS THAN ({})", e),
            BoundaryExpr::LiteralList(e) => format!("VALUES ({})", e),
        }
    }
}

/// Partition metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    /// Owning table name.
    pub table_name: String,

    /// Partition name.
    pub partition_name: String,

    /// Upper boundary / value list.
    pub high_value: BoundaryExpr,
}

impl PartitionDescriptor {
    pub fn new(
        table_name: impl Into<String>,
        partition_name: impl Into<String>,
        high_value: &str,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            partition_name: partition_name.into(),
            high_value: BoundaryExpr::parse(high_value),
        }
    }

    /// Identity used to match partitions across sides.
    pub fn key(&self) -> (&str, &str) {
        (&self.table_name, &self.partition_name)
    }

    /// Whether the partition name carries the reserved seed prefix.
    pub fn is_seed(&self, seed_prefix: &str) -> bool {
        !seed_prefix.is_empty()
            && self
                .partition_name
                .to_ascii_uppercase()
                .starts_with(&seed_prefix.to_ascii_uppercase())
    }
}

/// Referential (foreign key) constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintDescriptor {
    /// Table the constraint is declared on.
    pub table_name: String,

    /// Constraint name.
    pub constraint_name: String,
}

impl ConstraintDescriptor {
    pub fn new(table_name: impl Into<String>, constraint_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            constraint_name: constraint_name.into(),
        }
    }
}

/// Materialized view refresh mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Refreshed only when explicitly triggered.
    Demand,
    /// Refreshed on base-table commit.
    Commit,
    /// Never refreshed.
    Never,
}

impl RefreshMode {
    /// Parse a catalog refresh mode (`DEMAND`, `COMMIT`, `NEVER`).
    pub fn from_catalog(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEMAND" => RefreshMode::Demand,
            "COMMIT" => RefreshMode::Commit,
            _ => RefreshMode::Never,
        }
    }
}

/// Materialized view metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDescriptor {
    /// View name.
    pub name: String,

    /// How the view is refreshed.
    pub refresh_mode: RefreshMode,
}

impl ViewDescriptor {
    pub fn new(name: impl Into<String>, refresh_mode: RefreshMode) -> Self {
        Self {
            name: name.into(),
            refresh_mode,
        }
    }
}
