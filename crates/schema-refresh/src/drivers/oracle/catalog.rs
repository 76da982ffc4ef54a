//! Oracle data dictionary queries and row decoding.

use super::session::{escape_sql_string, TextRows};
use crate::core::{
    ConstraintDescriptor, PartitionDescriptor, RefreshMode, TableDescriptor, ViewDescriptor,
};
use crate::error::{RefreshError, Result};

pub fn tables_query(owner: &str) -> String {
    format!(
        "SELECT t.TABLE_NAME, t.TEMPORARY, \
         CASE WHEN m.MVIEW_NAME IS NULL THEN 'N' ELSE 'Y' END \
         FROM ALL_TABLES t \
         LEFT JOIN ALL_MVIEWS m ON m.OWNER = t.OWNER AND m.CONTAINER_NAME = t.TABLE_NAME \
         WHERE t.OWNER = '{}' AND t.DROPPED = 'NO' \
         ORDER BY t.TABLE_NAME",
        escape_sql_string(owner)
    )
}

pub fn partitions_query(owner: &str) -> String {
    format!(
        "SELECT TABLE_NAME, PARTITION_NAME, HIGH_VALUE \
         FROM ALL_TAB_PARTITIONS \
         WHERE TABLE_OWNER = '{}' \
         ORDER BY TABLE_NAME, PARTITION_POSITION",
        escape_sql_string(owner)
    )
}

pub fn constraints_query(owner: &str) -> String {
    format!(
        "SELECT TABLE_NAME, CONSTRAINT_NAME \
         FROM ALL_CONSTRAINTS \
         WHERE OWNER = '{}' AND CONSTRAINT_TYPE = 'R' \
         ORDER BY TABLE_NAME, CONSTRAINT_NAME",
        escape_sql_string(owner)
    )
}

pub fn views_query(owner: &str) -> String {
    format!(
        "SELECT MVIEW_NAME, REFRESH_MODE \
         FROM ALL_MVIEWS \
         WHERE OWNER = '{}' \
         ORDER BY MVIEW_NAME",
        escape_sql_string(owner)
    )
}

fn column<'a>(row: &'a [Option<String>], idx: usize, what: &str) -> Result<&'a str> {
    row.get(idx)
        .and_then(|v| v.as_deref())
        .ok_or_else(|| RefreshError::database("decoding catalog row", format!("missing {}", what)))
}

fn flag(row: &[Option<String>], idx: usize) -> bool {
    matches!(
        row.get(idx).and_then(|v| v.as_deref()).map(str::trim),
        Some("Y") | Some("YES")
    )
}

pub fn decode_tables(rows: TextRows) -> Result<Vec<TableDescriptor>> {
    rows.iter()
        .map(|row| {
            Ok(TableDescriptor {
                name: column(row, 0, "TABLE_NAME")?.to_string(),
                is_temporary: flag(row, 1),
                is_materialized_view: flag(row, 2),
            })
        })
        .collect()
}

pub fn decode_partitions(rows: TextRows) -> Result<Vec<PartitionDescriptor>> {
    rows.iter()
        .map(|row| {
            Ok(PartitionDescriptor::new(
                column(row, 0, "TABLE_NAME")?,
                column(row, 1, "PARTITION_NAME")?,
                column(row, 2, "HIGH_VALUE")?,
            ))
        })
        .collect()
}

pub fn decode_constraints(rows: TextRows) -> Result<Vec<ConstraintDescriptor>> {
    rows.iter()
        .map(|row| {
            Ok(ConstraintDescriptor::new(
                column(row, 0, "TABLE_NAME")?,
                column(row, 1, "CONSTRAINT_NAME")?,
            ))
        })
        .collect()
}

pub fn decode_views(rows: TextRows) -> Result<Vec<ViewDescriptor>> {
    rows.iter()
        .map(|row| {
            let mode = row.get(1).and_then(|v| v.as_deref()).unwrap_or("NEVER");
            Ok(ViewDescriptor::new(
                column(row, 0, "MVIEW_NAME")?,
                RefreshMode::from_catalog(mode),
            ))
        })
        .collect()
}

/// Decode a single `COUNT(*)` result.
pub fn decode_count(rows: TextRows) -> Result<u64> {
    let row = rows
        .first()
        .ok_or_else(|| RefreshError::database("counting rows", "query returned no rows"))?;
    let text = column(row, 0, "COUNT(*)")?;
    text.trim()
        .parse()
        .map_err(|e| RefreshError::database("counting rows", format!("'{}': {}", text, e)))
}
