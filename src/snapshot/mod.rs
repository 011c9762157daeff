//! Snapshot subsystem for custodia
//!
//! A snapshot is a consistent point-in-time copy of the live store, written
//! through the engine's own copy primitive, plus a JSON sidecar describing
//! it. Artifact and sidecar share a sortable timestamp stem and live
//! together in the backup directory.
//!
//! # Design principles
//!
//! - Atomic visibility: a sidecar is written only after its artifact is
//!   confirmed on disk, so a listed snapshot always has an artifact
//! - Zero partial success: any failure or cancellation during creation
//!   removes the artifact and registers nothing
//! - Isolated degradation: a failed row count for one table records 0 for
//!   that table and never aborts the snapshot
//! - Retention is a union: too old OR beyond the count limit both doom a
//!   snapshot

mod checksum;
mod errors;
mod record;

pub use checksum::{
    compute_checksum, compute_file_checksum, compute_file_checksum_with_cancel, format_checksum,
    parse_checksum,
};
pub use errors::{Severity, SnapshotError, SnapshotErrorCode, SnapshotResult};
pub use record::{SnapshotRecord, SIDECAR_FORMAT_VERSION};

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{ConfigError, ConfigResult, RetentionPolicy};
use crate::context::LifecycleContext;
use crate::observability::Logger;
use crate::store::StoreHandle;

/// Snapshot ID type (`YYYYMMDDTHHMMSSZ`, `-N` suffix on collision)
pub type SnapshotId = String;

/// Cooperative cancellation flag for long-running snapshot work.
///
/// Cancellation observes the same guarantee as a hard failure: no partial
/// artifact stays registered.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a retention sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionOutcome {
    pub deleted_count: usize,
    pub freed_bytes: u64,
}

/// Generates a snapshot ID from the current instant.
///
/// Format: `YYYYMMDDTHHMMSSZ`, e.g. `20260204T113000Z`. Lexical ordering of
/// ids equals chronological ordering.
pub fn generate_snapshot_id() -> SnapshotId {
    Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

/// fsync a directory so entry creation/removal is durable.
fn fsync_dir(path: &Path) -> SnapshotResult<()> {
    let dir = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| SnapshotError::io_error_at_path(path, e))?;

    dir.sync_all().map_err(|e| {
        SnapshotError::io_error(format!("fsync directory failed: {}", path.display()), e)
    })
}

/// Best-effort removal of a partial artifact on an error path.
fn cleanup_artifact(path: &Path) {
    if path.exists() {
        let _ = fs::remove_file(path);
    }
}

/// Creates, lists, and retires snapshot artifacts and their sidecars.
pub struct SnapshotStore<S: StoreHandle> {
    ctx: Arc<LifecycleContext<S>>,
}

impl<S: StoreHandle> SnapshotStore<S> {
    /// Build a snapshot store, creating the backup directory.
    ///
    /// An uncreatable or unwritable backup directory is a configuration
    /// error, fatal at startup.
    pub fn new(ctx: Arc<LifecycleContext<S>>) -> ConfigResult<Self> {
        let backup_dir = ctx.config.backup_dir.clone();

        fs::create_dir_all(&backup_dir).map_err(|e| ConfigError::BackupDir {
            path: backup_dir.clone(),
            source: e,
        })?;

        // Writability probe: retention and creation both need write access
        let probe = backup_dir.join(".custodia-probe");
        fs::write(&probe, b"probe")
            .and_then(|_| fs::remove_file(&probe))
            .map_err(|e| ConfigError::BackupDir {
                path: backup_dir,
                source: e,
            })?;

        Ok(Self { ctx })
    }

    fn backup_dir(&self) -> &Path {
        &self.ctx.config.backup_dir
    }

    fn artifact_path(&self, id: &str) -> PathBuf {
        self.backup_dir().join(format!("{}.db", id))
    }

    fn sidecar_path(&self, id: &str) -> PathBuf {
        self.backup_dir().join(format!("{}.json", id))
    }

    /// Derive a fresh, collision-free id for this instant.
    fn fresh_id(&self) -> SnapshotId {
        let base = generate_snapshot_id();
        if !self.artifact_path(&base).exists() && !self.sidecar_path(&base).exists() {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !self.artifact_path(&candidate).exists() && !self.sidecar_path(&candidate).exists()
            {
                return candidate;
            }
            n += 1;
        }
    }

    /// Create a snapshot of the live store.
    pub fn create_snapshot(&self, description: &str) -> SnapshotResult<SnapshotRecord> {
        self.create_snapshot_with_cancel(description, &CancelToken::new())
    }

    /// Create a snapshot, honoring a caller-supplied cancellation token.
    ///
    /// Sequence: copy via the engine primitive, confirm the artifact exists,
    /// collect best-effort row counts, checksum the artifact, then write the
    /// sidecar with fsync. Any failure removes the artifact and registers
    /// nothing.
    pub fn create_snapshot_with_cancel(
        &self,
        description: &str,
        token: &CancelToken,
    ) -> SnapshotResult<SnapshotRecord> {
        if token.is_cancelled() {
            return Err(SnapshotError::cancelled("snapshot creation"));
        }

        let id = self.fresh_id();
        let artifact_path = self.artifact_path(&id);

        if let Err(e) = self.ctx.store.snapshot_to(&artifact_path) {
            cleanup_artifact(&artifact_path);
            return Err(SnapshotError::snapshot_failed_caused(
                "atomic copy primitive failed",
                e,
            ));
        }

        let result = self.register_snapshot(&id, &artifact_path, description, token);

        if result.is_err() {
            cleanup_artifact(&artifact_path);
            let _ = fs::remove_file(self.sidecar_path(&id));
        }

        result
    }

    /// Post-copy registration steps, separated so cleanup stays in one place.
    fn register_snapshot(
        &self,
        id: &str,
        artifact_path: &Path,
        description: &str,
        token: &CancelToken,
    ) -> SnapshotResult<SnapshotRecord> {
        // The sidecar is only written once the artifact is confirmed on disk
        let artifact_meta = fs::metadata(artifact_path).map_err(|e| {
            SnapshotError::snapshot_failed_caused("artifact missing after copy", e)
        })?;

        let table_row_counts = self.collect_row_counts(token);

        if token.is_cancelled() {
            return Err(SnapshotError::cancelled("snapshot creation"));
        }

        let checksum = compute_file_checksum_with_cancel(artifact_path, token)?;

        let source_size_bytes = fs::metadata(self.ctx.live_path())
            .map(|m| m.len())
            .unwrap_or(0);

        let record = SnapshotRecord {
            id: id.to_string(),
            artifact_path: artifact_path.to_path_buf(),
            description: description.to_string(),
            created_at: Utc::now(),
            source_size_bytes,
            artifact_size_bytes: artifact_meta.len(),
            table_row_counts,
            checksum: format_checksum(checksum),
            format_version: SIDECAR_FORMAT_VERSION,
        };

        record.write_to_file(&self.sidecar_path(id))?;
        fsync_dir(self.backup_dir())?;

        Logger::info(
            "SNAPSHOT_CREATED",
            &[
                ("snapshot_id", id),
                ("description", description),
                ("bytes", &record.artifact_size_bytes.to_string()),
            ],
        );

        Ok(record)
    }

    /// Best-effort per-table row counts.
    ///
    /// A failed catalog listing yields an empty map; a failed count for one
    /// table records 0 for that table. Neither aborts the snapshot.
    fn collect_row_counts(&self, token: &CancelToken) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();

        let tables = match self.ctx.store.table_names() {
            Ok(tables) => tables,
            Err(_) => return counts,
        };

        for table in tables {
            if token.is_cancelled() {
                break;
            }

            let sql = format!("SELECT COUNT(*) AS n FROM \"{}\"", table);
            let count = self
                .ctx
                .store
                .query_all(&sql, &[])
                .ok()
                .and_then(|rows| rows.first().and_then(|r| r.get("n").cloned()))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);

            counts.insert(table, count);
        }

        counts
    }

    /// Incremental backup request, degraded to a full snapshot by design.
    ///
    /// If the live store file was modified after the latest snapshot's
    /// `created_at`, a full snapshot is taken. If it was not, the call is a
    /// no-op returning `None` instead of creating a redundant artifact.
    pub fn create_incremental_snapshot(
        &self,
        description: &str,
    ) -> SnapshotResult<Option<SnapshotRecord>> {
        if let Some(latest) = self.latest_snapshot()? {
            let mtime = fs::metadata(self.ctx.live_path())
                .and_then(|m| m.modified())
                .map_err(|e| SnapshotError::io_error_at_path(self.ctx.live_path(), e))?;
            let mtime: DateTime<Utc> = mtime.into();

            if mtime <= latest.created_at {
                Logger::info(
                    "SNAPSHOT_SKIPPED_UNCHANGED",
                    &[("latest_id", latest.id.as_str())],
                );
                return Ok(None);
            }
        }

        self.create_snapshot(description).map(Some)
    }

    /// List all snapshots, newest first.
    ///
    /// Unreadable or corrupt sidecars are skipped with a warning rather than
    /// failing the whole listing.
    pub fn list_snapshots(&self) -> SnapshotResult<Vec<SnapshotRecord>> {
        let entries = fs::read_dir(self.backup_dir())
            .map_err(|e| SnapshotError::io_error_at_path(self.backup_dir(), e))?;

        let mut records = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| SnapshotError::io_error_at_path(self.backup_dir(), e))?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match SnapshotRecord::read_from_file(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    Logger::warn(
                        "SIDECAR_SKIPPED",
                        &[
                            ("path", &path.display().to_string()),
                            ("reason", e.message()),
                        ],
                    );
                }
            }
        }

        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }

    /// The most recent snapshot, if any exist.
    pub fn latest_snapshot(&self) -> SnapshotResult<Option<SnapshotRecord>> {
        Ok(self.list_snapshots()?.into_iter().next())
    }

    /// Look up a snapshot by id.
    pub fn find_snapshot(&self, id: &str) -> SnapshotResult<Option<SnapshotRecord>> {
        Self::check_id(id)?;
        let sidecar = self.sidecar_path(id);
        if !sidecar.exists() {
            return Ok(None);
        }
        SnapshotRecord::read_from_file(&sidecar).map(Some)
    }

    /// Delete a snapshot's artifact and sidecar as a unit.
    ///
    /// Idempotent: a missing artifact does not block sidecar removal, and
    /// deleting an unknown id is a no-op.
    pub fn delete_snapshot(&self, id: &str) -> SnapshotResult<()> {
        Self::check_id(id)?;

        let artifact = match self.find_snapshot(id) {
            Ok(Some(record)) => record.artifact_path,
            // Sidecar gone or unreadable: fall back to the conventional path
            _ => self.artifact_path(id),
        };

        remove_if_exists(&artifact)?;
        remove_if_exists(&self.sidecar_path(id))?;
        fsync_dir(self.backup_dir())?;

        Logger::info("SNAPSHOT_DELETED", &[("snapshot_id", id)]);
        Ok(())
    }

    /// Apply the retention policy: delete every snapshot that is older than
    /// `max_age_days` OR outside the `max_count` most recent.
    ///
    /// The union of both sets is deleted, de-duplicated by id. This is
    /// deliberately more aggressive than either rule alone.
    pub fn enforce_retention(&self, policy: &RetentionPolicy) -> SnapshotResult<RetentionOutcome> {
        let snapshots = self.list_snapshots()?;
        let now = Utc::now();

        let mut doomed: Vec<&SnapshotRecord> = Vec::new();
        for (index, record) in snapshots.iter().enumerate() {
            let too_old = record.age_days(now) > i64::from(policy.max_age_days);
            let over_count = index >= policy.max_count;
            if too_old || over_count {
                doomed.push(record);
            }
        }

        let mut outcome = RetentionOutcome::default();
        for record in doomed {
            let freed = fs::metadata(&record.artifact_path).map(|m| m.len()).unwrap_or(0);
            self.delete_snapshot(&record.id)?;
            outcome.deleted_count += 1;
            outcome.freed_bytes += freed;
        }

        Logger::info(
            "RETENTION_SWEEP",
            &[
                ("deleted", &outcome.deleted_count.to_string()),
                ("freed_bytes", &outcome.freed_bytes.to_string()),
            ],
        );

        Ok(outcome)
    }

    /// Reject ids that could escape the backup directory.
    fn check_id(id: &str) -> SnapshotResult<()> {
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(SnapshotError::snapshot_failed(format!(
                "invalid snapshot id: {}",
                id
            )));
        }
        Ok(())
    }
}

/// Remove a file, treating "already gone" as success.
fn remove_if_exists(path: &Path) -> SnapshotResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SnapshotError::io_error_at_path(path, e)),
    }
}
