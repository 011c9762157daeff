//! CLI-specific error types
//!
//! Any error reaching the CLI boundary is fatal to that invocation and maps
//! to exit code 2.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::health::HealthError;
use crate::restore::RestoreError;
use crate::scheduler::SchedulerError;
use crate::snapshot::SnapshotError;
use crate::store::StoreError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Store could not be opened or probed
    StoreError,
    /// Snapshot operation failed
    SnapshotError,
    /// Restore operation failed
    RestoreError,
    /// Scheduler setup failed
    SchedulerError,
    /// I/O error
    IoError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CUSTODIA_CLI_CONFIG_ERROR",
            Self::StoreError => "CUSTODIA_CLI_STORE_ERROR",
            Self::SnapshotError => "CUSTODIA_CLI_SNAPSHOT_ERROR",
            Self::RestoreError => "CUSTODIA_CLI_RESTORE_ERROR",
            Self::SchedulerError => "CUSTODIA_CLI_SCHEDULER_ERROR",
            Self::IoError => "CUSTODIA_CLI_IO_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::new(CliErrorCode::StoreError, e.to_string())
    }
}

impl From<SnapshotError> for CliError {
    fn from(e: SnapshotError) -> Self {
        Self::new(CliErrorCode::SnapshotError, e.to_string())
    }
}

impl From<RestoreError> for CliError {
    fn from(e: RestoreError) -> Self {
        Self::new(CliErrorCode::RestoreError, e.to_string())
    }
}

impl From<SchedulerError> for CliError {
    fn from(e: SchedulerError) -> Self {
        Self::new(CliErrorCode::SchedulerError, e.to_string())
    }
}

impl From<HealthError> for CliError {
    fn from(e: HealthError) -> Self {
        Self::io_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
