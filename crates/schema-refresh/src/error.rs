//! Error types for the refresh engine.

use thiserror::Error;

/// Main error type for refresh operations.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog discovery failed; nothing can be replicated safely.
    #[error("Catalog read failed ({side}): {message}")]
    Catalog { side: String, message: String },

    /// Statement or connection error reported by a data store.
    #[error("Database error while {context}: {message}")]
    Database { context: String, message: String },

    /// A single unit of work (constraint, partition, table, view) failed.
    #[error("{unit} failed: {message}")]
    Unit { unit: String, message: String },

    /// A unit exceeded its time allowance.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// A unit exceeded its time allowance but its work still completed.
    #[error("timed out after {0}s; the work completed late and was committed")]
    Overran(u64),

    /// Run log or audit sink could not persist entries.
    #[error("Log store error: {0}")]
    Store(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Refresh was cancelled (SIGINT, etc.)
    #[error("Refresh cancelled")]
    Cancelled,
}

impl RefreshError {
    /// Create a Catalog error for one side of the refresh.
    pub fn catalog(side: impl ToString, message: impl Into<String>) -> Self {
        RefreshError::Catalog {
            side: side.to_string(),
            message: message.into(),
        }
    }

    /// Create a Database error with context about where it occurred.
    pub fn database(context: impl Into<String>, message: impl ToString) -> Self {
        RefreshError::Database {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a Unit error.
    pub fn unit(unit: impl Into<String>, message: impl Into<String>) -> Self {
        RefreshError::Unit {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Short error code for log entries.
    ///
    /// Driver errors carry the store's own code (`ORA-00054`, ...) somewhere in
    /// their text; that code wins over the variant code when present.
    pub fn code(&self) -> String {
        if let Some(code) = find_ora_code(&self.to_string()) {
            return code;
        }
        let code = match self {
            RefreshError::Config(_) => "REFRESH-CONFIG",
            RefreshError::Catalog { .. } => "REFRESH-CATALOG",
            RefreshError::Database { .. } => "REFRESH-DB",
            RefreshError::Unit { .. } => "REFRESH-UNIT",
            RefreshError::Timeout(_) | RefreshError::Overran(_) => "REFRESH-TIMEOUT",
            RefreshError::Store(_) => "REFRESH-STORE",
            RefreshError::Io(_) => "REFRESH-IO",
            RefreshError::Yaml(_) => "REFRESH-YAML",
            RefreshError::Json(_) => "REFRESH-JSON",
            RefreshError::Cancelled => "REFRESH-CANCELLED",
        };
        code.to_string()
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            RefreshError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

impl From<odbc_api::Error> for RefreshError {
    fn from(e: odbc_api::Error) -> Self {
        RefreshError::database("executing ODBC call", e)
    }
}

/// Find the first `ORA-NNNNN` token in a message.
fn find_ora_code(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(pos) = text[start..].find("ORA-") {
        let at = start + pos;
        let digits = &bytes[at + 4..];
        if digits.len() >= 5 && digits[..5].iter().all(u8::is_ascii_digit) {
            return Some(text[at..at + 9].to_string());
        }
        start = at + 4;
    }
    None
}

/// Result type alias for refresh operations.
pub type Result<T> = std::result::Result<T, RefreshError>;
