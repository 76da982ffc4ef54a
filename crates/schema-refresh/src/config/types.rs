//! Configuration types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::catalog::{DEFAULT_LOG_TABLE_PREFIX, DEFAULT_SEED_PARTITION_PREFIX};
use crate::report::MAX_REPORTED_FAILURES;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Environment copied from.
    pub source: SourceConfig,

    /// Environment being refreshed.
    pub target: TargetConfig,

    /// Refresh behavior.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Where audit records and run logs go.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source database configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// ODBC driver name.
    #[serde(default = "default_oracle_driver")]
    pub driver: String,

    /// Database host.
    pub host: String,

    /// Listener port (default: 1521).
    #[serde(default = "default_oracle_port")]
    pub port: u16,

    /// Service name.
    pub service_name: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Schema (owner) to copy from.
    pub schema: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service_name", &self.service_name)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Target database configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// ODBC driver name.
    #[serde(default = "default_oracle_driver")]
    pub driver: String,

    /// Database host.
    pub host: String,

    /// Listener port (default: 1521).
    #[serde(default = "default_oracle_port")]
    pub port: u16,

    /// Service name.
    pub service_name: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Schema (owner) to refresh.
    pub schema: String,

    /// Database link from the target session to the source instance.
    /// Required when source and target are different instances.
    #[serde(default)]
    pub db_link: Option<String>,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service_name", &self.service_name)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("db_link", &self.db_link)
            .finish()
    }
}

/// Refresh behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Target identity used in reports (default: target service name).
    #[serde(default)]
    pub name: Option<String>,

    /// Tables whose name starts with this prefix are never replicated.
    #[serde(default = "default_log_table_prefix")]
    pub log_table_prefix: String,

    /// Partitions whose name starts with this prefix are never reconciled.
    #[serde(default = "default_seed_partition_prefix")]
    pub seed_partition_prefix: String,

    /// Concurrent table syncs (default: 1).
    #[serde(default)]
    pub workers: Option<usize>,

    /// Time allowance per unit of work, in seconds.
    #[serde(default)]
    pub unit_timeout_secs: Option<u64>,

    /// Failures listed in the report body (default: 12).
    #[serde(default)]
    pub max_reported_failures: Option<usize>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            name: None,
            log_table_prefix: default_log_table_prefix(),
            seed_partition_prefix: default_seed_partition_prefix(),
            workers: None,
            unit_timeout_secs: None,
            max_reported_failures: None,
        }
    }
}

impl RefreshConfig {
    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(1)
    }

    pub fn get_max_reported_failures(&self) -> usize {
        self.max_reported_failures.unwrap_or(MAX_REPORTED_FAILURES)
    }
}

/// Audit and run-log destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_audit_sink")]
    pub audit: SinkConfig,

    #[serde(default = "default_run_log_sink")]
    pub run_log: SinkConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            audit: default_audit_sink(),
            run_log: default_run_log_sink(),
        }
    }
}

/// One log destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub kind: SinkKind,

    /// File path, for `file` sinks.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Table in the target schema, for `database` sinks.
    #[serde(default)]
    pub table: Option<String>,
}

/// Log destination kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Local file.
    #[default]
    File,

    /// Table on the target, written over its own connection.
    Database,
}

// Default value functions for serde
fn default_oracle_driver() -> String {
    "Oracle 21 ODBC driver".to_string()
}

fn default_oracle_port() -> u16 {
    1521
}

fn default_log_table_prefix() -> String {
    DEFAULT_LOG_TABLE_PREFIX.to_string()
}

fn default_seed_partition_prefix() -> String {
    DEFAULT_SEED_PARTITION_PREFIX.to_string()
}

fn default_audit_sink() -> SinkConfig {
    SinkConfig {
        kind: SinkKind::File,
        path: Some(PathBuf::from("refresh-audit.jsonl")),
        table: Some("REFRESH_LOG_AUDIT".to_string()),
    }
}

fn default_run_log_sink() -> SinkConfig {
    SinkConfig {
        kind: SinkKind::File,
        path: Some(PathBuf::from("refresh-runs.json")),
        table: Some("REFRESH_LOG_RUNS".to_string()),
    }
}
