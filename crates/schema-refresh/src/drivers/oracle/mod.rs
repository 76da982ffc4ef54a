//! Oracle driver over ODBC.
//!
//! - [`OracleDialect`]: SQL syntax strategy for Oracle
//! - [`OracleConnectivity`]: catalog reads, target DDL and bulk copy
//! - [`OracleAuditSink`] / [`OracleRunLogStore`]: log tables in the target schema

mod catalog;
mod connectivity;
mod dialect;
mod session;
mod sinks;

pub use connectivity::OracleConnectivity;
pub use dialect::OracleDialect;
pub use session::{create_environment, OdbcSession};
pub use sinks::{OracleAuditSink, OracleRunLogStore};
