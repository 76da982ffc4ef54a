//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;
use std::time::Duration;

/// Default run-log table for `database` sinks.
pub const DEFAULT_RUN_LOG_TABLE: &str = "REFRESH_LOG_RUNS";

/// Default audit table for `database` sinks.
pub const DEFAULT_AUDIT_TABLE: &str = "REFRESH_LOG_AUDIT";

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Target identity for reports and audit messages.
    pub fn target_name(&self) -> String {
        self.refresh
            .name
            .clone()
            .unwrap_or_else(|| self.target.service_name.clone())
    }

    /// Whether source and target live in the same database instance.
    pub fn same_instance(&self) -> bool {
        self.source.host.eq_ignore_ascii_case(&self.target.host)
            && self.source.port == self.target.port
            && self
                .source
                .service_name
                .eq_ignore_ascii_case(&self.target.service_name)
    }

    /// Unit time allowance, if configured.
    pub fn unit_timeout(&self) -> Option<Duration> {
        self.refresh.unit_timeout_secs.map(Duration::from_secs)
    }
}

impl SourceConfig {
    /// Build an ODBC connection string.
    pub fn connection_string(&self) -> String {
        odbc_connection_string(
            &self.driver,
            &self.host,
            self.port,
            &self.service_name,
            &self.user,
            &self.password,
        )
    }
}

impl TargetConfig {
    /// Build an ODBC connection string.
    pub fn connection_string(&self) -> String {
        odbc_connection_string(
            &self.driver,
            &self.host,
            self.port,
            &self.service_name,
            &self.user,
            &self.password,
        )
    }
}

impl SinkConfig {
    /// Table name for a `database` sink, falling back to `default`.
    pub fn table_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.table.as_deref().unwrap_or(default)
    }
}

fn odbc_connection_string(
    driver: &str,
    host: &str,
    port: u16,
    service_name: &str,
    user: &str,
    password: &str,
) -> String {
    format!(
        "Driver={{{}}};DBQ={}:{}/{};UID={};PWD={{{}}};",
        driver,
        host,
        port,
        service_name,
        user,
        password.replace('}', "}}")
    )
}
