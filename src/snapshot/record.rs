//! Snapshot sidecar records
//!
//! One sidecar per artifact, co-located with it and named after the same
//! timestamp stem (`<id>.json` beside `<id>.db`). The sidecar is the
//! authoritative descriptor for a snapshot: pretty-printed JSON so operators
//! can read and diff it.
//!
//! A sidecar is written strictly after its artifact is confirmed to exist on
//! disk, and never mutated afterwards. Two records never share an
//! `artifact_path`: the path embeds the unique id.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{SnapshotError, SnapshotResult};

/// Current sidecar format version
pub const SIDECAR_FORMAT_VERSION: u8 = 1;

/// Descriptor for one successful snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Timestamp-derived id (`YYYYMMDDTHHMMSSZ`, optionally `-N` suffixed);
    /// lexical order equals chronological order
    pub id: String,

    /// On-disk artifact location, owned exclusively by the snapshot store
    pub artifact_path: PathBuf,

    /// Free-text label ("daily", "pre-restore safety copy", ...)
    pub description: String,

    /// Creation timestamp, immutable once set
    pub created_at: DateTime<Utc>,

    /// Live store size at creation time
    pub source_size_bytes: u64,

    /// Artifact size at creation time
    pub artifact_size_bytes: u64,

    /// Best-effort per-table row counts at snapshot time (0 for tables whose
    /// count failed)
    pub table_row_counts: BTreeMap<String, u64>,

    /// CRC32 of the artifact, computed once at creation
    pub checksum: String,

    /// Sidecar format version
    pub format_version: u8,
}

impl SnapshotRecord {
    /// Serializes the record to pretty-printed JSON.
    pub fn to_json(&self) -> SnapshotResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::sidecar_error(format!("failed to serialize sidecar: {}", e)))
    }

    /// Deserializes a record from JSON.
    pub fn from_json(json: &str) -> SnapshotResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SnapshotError::sidecar_error(format!("failed to parse sidecar: {}", e)))
    }

    /// Writes the record to a sidecar file with fsync.
    ///
    /// Callers must only invoke this after the artifact exists on disk.
    pub fn write_to_file(&self, path: &Path) -> SnapshotResult<()> {
        let json = self.to_json()?;

        let mut file = File::create(path).map_err(|e| {
            SnapshotError::sidecar_io_error(
                format!("failed to create sidecar: {}", path.display()),
                e,
            )
        })?;

        file.write_all(json.as_bytes()).map_err(|e| {
            SnapshotError::sidecar_io_error(
                format!("failed to write sidecar: {}", path.display()),
                e,
            )
        })?;

        file.sync_all().map_err(|e| {
            SnapshotError::sidecar_io_error(
                format!("failed to fsync sidecar: {}", path.display()),
                e,
            )
        })?;

        Ok(())
    }

    /// Reads a record from a sidecar file.
    pub fn read_from_file(path: &Path) -> SnapshotResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SnapshotError::sidecar_io_error(
                format!("failed to read sidecar: {}", path.display()),
                e,
            )
        })?;

        Self::from_json(&content)
    }

    /// Whole days elapsed since this snapshot was created.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// Compression ratio of artifact to source (1.0 when sizes match).
    pub fn compression_ratio(&self) -> f64 {
        if self.source_size_bytes == 0 {
            return 1.0;
        }
        self.artifact_size_bytes as f64 / self.source_size_bytes as f64
    }
}
