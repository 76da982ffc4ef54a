//! # schema-refresh
//!
//! Refresh one relational schema from another: a lower environment is brought
//! back in line with a higher one, structure and content.
//!
//! A run:
//!
//! - **Discovers** tables, foreign keys, partitions and demand-mode
//!   materialized views
//! - **Reconciles** the target's partitions with the source's
//! - **Truncates and reloads** every table, isolating per-table failures
//! - **Refreshes** materialized views and re-enables foreign keys
//! - **Reports** a summary and persists every recorded failure
//!
//! ## Example
//!
//! ```rust,no_run
//! use schema_refresh::{Config, ReplicationOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = ReplicationOrchestrator::from_config(&config).await?;
//!     let result = orchestrator.run(None).await;
//!     println!("{}: {} tables synchronized", result.outcome, result.tables_synced);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod constraints;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod partition;
pub mod report;
pub mod run;
pub mod sync;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::{Config, RefreshConfig, SourceConfig, TargetConfig};
pub use error::{RefreshError, Result};
pub use orchestrator::{RefreshOptions, RefreshPlan, ReplicationOrchestrator, RunResult, Sinks};
pub use report::{RunReport, RunReporter};
pub use run::{ReplicationRun, RunOutcome, RunPhase};
