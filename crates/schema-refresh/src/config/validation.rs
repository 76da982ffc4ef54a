//! Configuration validation.

use super::{Config, SinkConfig, SinkKind};
use crate::error::{RefreshError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    require("source.host", &config.source.host)?;
    require("source.service_name", &config.source.service_name)?;
    require("source.user", &config.source.user)?;
    require("source.schema", &config.source.schema)?;

    // Target validation
    require("target.host", &config.target.host)?;
    require("target.service_name", &config.target.service_name)?;
    require("target.user", &config.target.user)?;
    require("target.schema", &config.target.schema)?;

    // Cannot refresh a schema from itself
    if config.same_instance()
        && config
            .source
            .schema
            .eq_ignore_ascii_case(&config.target.schema)
    {
        return Err(RefreshError::Config(
            "source and target cannot be the same schema".into(),
        ));
    }

    match &config.target.db_link {
        Some(link) => {
            if link.is_empty() || !link.chars().all(is_link_char) {
                return Err(RefreshError::Config(format!(
                    "target.db_link '{}' is not a valid database link name",
                    link
                )));
            }
        }
        None if !config.same_instance() => {
            return Err(RefreshError::Config(
                "target.db_link is required when source and target are different instances"
                    .into(),
            ));
        }
        None => {}
    }

    // Refresh config validation - only check if explicitly set
    if let Some(0) = config.refresh.workers {
        return Err(RefreshError::Config(
            "refresh.workers must be at least 1".into(),
        ));
    }
    if let Some(0) = config.refresh.max_reported_failures {
        return Err(RefreshError::Config(
            "refresh.max_reported_failures must be at least 1".into(),
        ));
    }
    if let Some(0) = config.refresh.unit_timeout_secs {
        return Err(RefreshError::Config(
            "refresh.unit_timeout_secs must be at least 1".into(),
        ));
    }

    validate_sink("logging.audit", &config.logging.audit)?;
    validate_sink("logging.run_log", &config.logging.run_log)?;

    Ok(())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RefreshError::Config(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_sink(field: &str, sink: &SinkConfig) -> Result<()> {
    match sink.kind {
        SinkKind::File => {
            if sink.path.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
                return Err(RefreshError::Config(format!(
                    "{}.path is required for file sinks",
                    field
                )));
            }
        }
        SinkKind::Database => {
            if let Some(table) = &sink.table {
                if table.is_empty() || !table.chars().all(is_link_char) {
                    return Err(RefreshError::Config(format!(
                        "{}.table '{}' is not a valid table name",
                        field, table
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Characters allowed in an unquoted Oracle object name (plus `.` for domains).
fn is_link_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#' | '.')
}
