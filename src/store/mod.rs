//! Abstract relational store interface
//!
//! The lifecycle manager never talks to a concrete database engine. It is
//! written against [`StoreHandle`], a small seam exposing exactly the
//! operations the lifecycle subsystems need:
//!
//! - `query_all` / `exec` for catalog probes, row counts, and latency samples
//! - `integrity_check` for the engine's native structural check
//! - `foreign_key_violations` for the referential scan
//! - `table_names` for catalog listing
//! - `snapshot_to` for the engine's consistent point-in-time copy primitive
//!
//! `snapshot_to` must not require an exclusive lock that starves concurrent
//! readers: an implementation is expected to use the engine's own online
//! backup mechanism rather than a naive copy while writers are active.
//!
//! [`StoreOpener`] opens a store file read-only, which is how the verifier
//! inspects snapshot artifacts without touching the live store.

mod file;

pub use file::{ChecksumFileOpener, ChecksumFileStore};

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// One result row: column name to value.
pub type Row = HashMap<String, serde_json::Value>;

/// Outcome of a mutating statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Number of rows changed
    pub changed: u64,
    /// Row id of the last insert, if the engine reports one
    pub last_id: Option<i64>,
}

/// One referential-integrity violation reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Table owning the offending row
    pub table: String,
    /// Identifier of the offending row
    pub row_id: i64,
    /// Table the broken reference points at
    pub parent_table: String,
    /// Column the broken reference points at
    pub parent_column: String,
}

/// Errors surfaced by a store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {sql}: {message}")]
    Query { sql: String, message: String },

    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("operation not supported by this adapter: {0}")]
    Unsupported(&'static str),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to a relational store.
///
/// Implementations wrap a concrete engine; the bundled
/// [`ChecksumFileStore`] wraps a plain file for engines that expose their
/// state as a single checksummed artifact.
pub trait StoreHandle {
    /// Run a read query and collect every row.
    fn query_all(&self, sql: &str, params: &[serde_json::Value]) -> StoreResult<Vec<Row>>;

    /// Run a mutating statement.
    fn exec(&self, sql: &str, params: &[serde_json::Value]) -> StoreResult<ExecOutcome>;

    /// Run the engine's native structural integrity check.
    ///
    /// `Ok(false)` means the check ran and found corruption. Failure to run
    /// the check at all is an `Err`.
    fn integrity_check(&self) -> StoreResult<bool>;

    /// Scan for referential-integrity violations.
    fn foreign_key_violations(&self) -> StoreResult<Vec<Violation>>;

    /// List user table names from the engine catalog.
    fn table_names(&self) -> StoreResult<Vec<String>>;

    /// Write a consistent point-in-time copy of the store to `dest`.
    fn snapshot_to(&self, dest: &Path) -> StoreResult<()>;
}

/// Opens store files read-only for inspection.
pub trait StoreOpener {
    type Handle: StoreHandle;

    /// Open the store file at `path` without permitting writes.
    fn open_read_only(&self, path: &Path) -> StoreResult<Self::Handle>;
}
