//! Snapshot error types
//!
//! Error codes:
//! - CUSTODIA_SNAPSHOT_FAILED (ERROR severity)
//! - CUSTODIA_SNAPSHOT_IO (ERROR severity)
//! - CUSTODIA_SNAPSHOT_SIDECAR (ERROR severity)
//! - CUSTODIA_SNAPSHOT_CANCELLED (ERROR severity)
//! - CUSTODIA_SNAPSHOT_NOT_FOUND (ERROR severity)

use std::fmt;

/// Severity levels for snapshot errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, process continues
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Snapshot-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotErrorCode {
    /// Atomic copy primitive or a later creation step failed
    SnapshotFailed,
    /// I/O failure while handling artifacts or the backup directory
    SnapshotIo,
    /// Sidecar serialization, write, or parse failure
    SnapshotSidecar,
    /// Caller-supplied cancellation token tripped mid-operation
    SnapshotCancelled,
    /// No snapshot registered under the requested id
    SnapshotNotFound,
}

impl SnapshotErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SnapshotErrorCode::SnapshotFailed => "CUSTODIA_SNAPSHOT_FAILED",
            SnapshotErrorCode::SnapshotIo => "CUSTODIA_SNAPSHOT_IO",
            SnapshotErrorCode::SnapshotSidecar => "CUSTODIA_SNAPSHOT_SIDECAR",
            SnapshotErrorCode::SnapshotCancelled => "CUSTODIA_SNAPSHOT_CANCELLED",
            SnapshotErrorCode::SnapshotNotFound => "CUSTODIA_SNAPSHOT_NOT_FOUND",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        // Snapshot failure never requires process termination
        Severity::Error
    }
}

impl fmt::Display for SnapshotErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Snapshot error type with full context
#[derive(Debug)]
pub struct SnapshotError {
    code: SnapshotErrorCode,
    message: String,
    details: Option<String>,
    source: Option<Cause>,
}

impl SnapshotError {
    /// Create a new snapshot failed error
    pub fn snapshot_failed(message: impl Into<String>) -> Self {
        Self {
            code: SnapshotErrorCode::SnapshotFailed,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a snapshot failed error carrying the underlying cause
    pub fn snapshot_failed_caused(message: impl Into<String>, source: impl Into<Cause>) -> Self {
        Self {
            code: SnapshotErrorCode::SnapshotFailed,
            message: message.into(),
            details: None,
            source: Some(source.into()),
        }
    }

    /// Create a new snapshot I/O error
    pub fn io_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            code: SnapshotErrorCode::SnapshotIo,
            message: message.into(),
            details: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a snapshot I/O error with path context
    pub fn io_error_at_path(path: &std::path::Path, source: std::io::Error) -> Self {
        Self {
            code: SnapshotErrorCode::SnapshotIo,
            message: format!("I/O error at path: {}", path.display()),
            details: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a sidecar error
    pub fn sidecar_error(message: impl Into<String>) -> Self {
        Self {
            code: SnapshotErrorCode::SnapshotSidecar,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a sidecar error with an I/O cause
    pub fn sidecar_io_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            code: SnapshotErrorCode::SnapshotSidecar,
            message: message.into(),
            details: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self {
            code: SnapshotErrorCode::SnapshotCancelled,
            message: format!("cancelled during {}", operation.into()),
            details: None,
            source: None,
        }
    }

    /// Create a not-found error for the given snapshot id
    pub fn not_found(id: impl Into<String>) -> Self {
        Self {
            code: SnapshotErrorCode::SnapshotNotFound,
            message: format!("no snapshot registered under id: {}", id.into()),
            details: None,
            source: None,
        }
    }

    /// Add details to an error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> SnapshotErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;
