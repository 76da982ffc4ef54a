//! Database driver implementations.
//!
//! Each driver implements the core seams for one engine:
//!
//! - `Dialect`: SQL syntax strategy
//! - `Connectivity`: catalog reads on both sides, target execution, bulk copy
//!
//! Only [`oracle`] ships today. The engine never names a driver type; it works
//! with `Arc<dyn Connectivity>`.

pub mod oracle;

pub use oracle::{OracleConnectivity, OracleDialect};
