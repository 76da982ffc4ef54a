//! Core abstractions shared by every refresh phase.
//!
//! - [`schema`]: table, partition, constraint and view descriptors
//! - [`statement`]: typed target-side mutations
//! - [`traits`]: the connectivity and dialect seams
//! - [`unit`]: failure isolation around one unit of work

pub mod schema;
pub mod statement;
pub mod traits;
pub mod unit;

pub use schema::{
    BoundaryExpr, ConstraintDescriptor, PartitionDescriptor, RefreshMode, Side, TableDescriptor,
    ViewDescriptor,
};
pub use statement::Statement;
pub use traits::{Connectivity, Dialect};
pub use unit::{isolate, panic_message, UnitOutcome};
