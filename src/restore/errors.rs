//! Restore error types
//!
//! Error codes:
//! - CUSTODIA_RESTORE_FAILED (ERROR severity)
//! - CUSTODIA_RESTORE_SNAPSHOT_NOT_FOUND (ERROR severity)
//! - CUSTODIA_RESTORE_CORRUPT_SNAPSHOT (ERROR severity)
//! - CUSTODIA_RESTORE_IN_PROGRESS (ERROR severity)
//! - CUSTODIA_RESTORE_VERIFY_FAILED (ERROR severity)
//! - CUSTODIA_RESTORE_IO (ERROR severity)
//!
//! Every restore error is fatal to that restore attempt and leaves the
//! target unchanged, except VERIFY_FAILED which names the safety copy the
//! operator can fall back to.

use std::fmt;
use std::io;

/// Severity levels for restore errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Restore attempt fails, process continues
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Restore-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreErrorCode {
    /// General restore failure
    RestoreFailed,
    /// Requested snapshot absent, or its artifact missing on disk
    SnapshotNotFound,
    /// Pre-copy integrity gate rejected the artifact
    CorruptSnapshot,
    /// Another restore is already running against the same target
    RestoreInProgress,
    /// Post-copy verification of the target failed
    VerifyFailed,
    /// I/O failure while copying files
    RestoreIo,
}

impl RestoreErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            RestoreErrorCode::RestoreFailed => "CUSTODIA_RESTORE_FAILED",
            RestoreErrorCode::SnapshotNotFound => "CUSTODIA_RESTORE_SNAPSHOT_NOT_FOUND",
            RestoreErrorCode::CorruptSnapshot => "CUSTODIA_RESTORE_CORRUPT_SNAPSHOT",
            RestoreErrorCode::RestoreInProgress => "CUSTODIA_RESTORE_IN_PROGRESS",
            RestoreErrorCode::VerifyFailed => "CUSTODIA_RESTORE_VERIFY_FAILED",
            RestoreErrorCode::RestoreIo => "CUSTODIA_RESTORE_IO",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for RestoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Restore error type with full context
#[derive(Debug)]
pub struct RestoreError {
    code: RestoreErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl RestoreError {
    /// Create a general restore failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: RestoreErrorCode::RestoreFailed,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a snapshot-not-found error
    pub fn snapshot_not_found(id: impl Into<String>) -> Self {
        Self {
            code: RestoreErrorCode::SnapshotNotFound,
            message: format!("snapshot not found: {}", id.into()),
            details: None,
            source: None,
        }
    }

    /// Create a corrupt-snapshot error for a named artifact
    pub fn corrupt_snapshot(artifact: &std::path::Path) -> Self {
        Self {
            code: RestoreErrorCode::CorruptSnapshot,
            message: format!("snapshot artifact failed integrity check: {}", artifact.display()),
            details: None,
            source: None,
        }
    }

    /// Create an in-progress error for a contended target
    pub fn in_progress(target: &std::path::Path) -> Self {
        Self {
            code: RestoreErrorCode::RestoreInProgress,
            message: format!("a restore is already running for: {}", target.display()),
            details: None,
            source: None,
        }
    }

    /// Create a post-copy verification failure
    pub fn verify_failed(target: &std::path::Path) -> Self {
        Self {
            code: RestoreErrorCode::VerifyFailed,
            message: format!("restored target failed verification: {}", target.display()),
            details: None,
            source: None,
        }
    }

    /// Create an I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: RestoreErrorCode::RestoreIo,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create an I/O error with path context
    pub fn io_error_at_path(path: &std::path::Path, source: io::Error) -> Self {
        Self {
            code: RestoreErrorCode::RestoreIo,
            message: format!("I/O error at path: {}", path.display()),
            details: None,
            source: Some(source),
        }
    }

    /// Add details to an error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> RestoreErrorCode {
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

impl fmt::Display for RestoreError {
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

impl std::error::Error for RestoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for restore operations
pub type RestoreResult<T> = Result<T, RestoreError>;
