//! Restore subsystem for custodia
//!
//! Restore replaces the live store file with a snapshot artifact. Each step
//! is a hard gate on the next:
//!
//! 1. Resolve the snapshot record; the artifact must exist on disk
//! 2. Verify the artifact: recorded checksum, then the engine's structural
//!    check. A corrupt snapshot never overwrites a live store
//! 3. Copy the existing target aside to a timestamped safety location
//! 4. Copy the artifact onto the target, with fsync
//! 5. Re-verify the target; failure here is reported as a failed restore
//!    even though the copy succeeded, and the safety copy is the operator's
//!    recovery path
//!
//! Verifying both before and after the copy is the core correctness
//! property: a snapshot's integrity is never trusted retroactively.
//!
//! At most one restore may run against a given target path; a second caller
//! is rejected with `CUSTODIA_RESTORE_IN_PROGRESS`. The safety copy is
//! never deleted automatically; its location is logged.

mod errors;

pub use errors::{RestoreError, RestoreErrorCode, RestoreResult, Severity};

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::context::LifecycleContext;
use crate::observability::Logger;
use crate::snapshot::{
    compute_file_checksum, format_checksum, generate_snapshot_id, SnapshotStore,
};
use crate::store::{StoreHandle, StoreOpener};
use crate::verify::IntegrityVerifier;

/// Result of a completed restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Snapshot that was restored
    pub snapshot_id: String,
    /// Path the snapshot was restored onto
    pub target: PathBuf,
    /// Safety copy of the previous target contents, if one existed
    pub safety_copy: Option<PathBuf>,
}

/// Orchestrates validated restores from the snapshot store.
pub struct RecoveryCoordinator<S: StoreHandle, O: StoreOpener> {
    ctx: Arc<LifecycleContext<S>>,
    snapshots: Arc<SnapshotStore<S>>,
    verifier: IntegrityVerifier<S, O>,
    in_progress: Mutex<HashSet<PathBuf>>,
}

impl<S: StoreHandle, O: StoreOpener> RecoveryCoordinator<S, O> {
    pub fn new(
        ctx: Arc<LifecycleContext<S>>,
        snapshots: Arc<SnapshotStore<S>>,
        verifier: IntegrityVerifier<S, O>,
    ) -> Self {
        Self {
            ctx,
            snapshots,
            verifier,
            in_progress: Mutex::new(HashSet::new()),
        }
    }

    /// Restore a snapshot onto `target` (the live store path by default).
    pub fn restore(
        &self,
        snapshot_id: &str,
        target: Option<&Path>,
    ) -> RestoreResult<RestoreOutcome> {
        let target = target.unwrap_or(self.ctx.live_path()).to_path_buf();
        let _claim = self.claim(&target)?;

        // Gate 1: resolve the record and its artifact
        let record = self
            .snapshots
            .find_snapshot(snapshot_id)
            .map_err(|e| RestoreError::failed(e.to_string()))?
            .ok_or_else(|| RestoreError::snapshot_not_found(snapshot_id))?;

        if !record.artifact_path.exists() {
            return Err(RestoreError::snapshot_not_found(snapshot_id)
                .with_details(format!("artifact missing: {}", record.artifact_path.display())));
        }

        // Gate 2a: the artifact must still match its recorded checksum
        let actual = compute_file_checksum(&record.artifact_path)
            .map_err(|e| RestoreError::failed(e.to_string()))?;
        if format_checksum(actual) != record.checksum {
            return Err(RestoreError::corrupt_snapshot(&record.artifact_path)
                .with_details("checksum mismatch against sidecar"));
        }

        // Gate 2b: the engine's structural check on the artifact
        if !self.verifier.verify(&record.artifact_path) {
            return Err(RestoreError::corrupt_snapshot(&record.artifact_path));
        }

        // Gate 3: safety copy of the current target before any mutation
        let safety_copy = if target.exists() {
            let safety = safety_copy_path(&target);
            copy_file_with_fsync(&target, &safety)?;
            Logger::info(
                "SAFETY_COPY_CREATED",
                &[
                    ("path", &safety.display().to_string()),
                    ("target", &target.display().to_string()),
                ],
            );
            Some(safety)
        } else {
            None
        };

        // Gate 4: the actual overwrite
        copy_file_with_fsync(&record.artifact_path, &target)?;

        // Gate 5: never trust the copy; re-verify the target
        if !self.verifier.verify(&target) {
            let safety_note = safety_copy
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string());
            Logger::error(
                "RESTORE_VERIFY_FAILED",
                &[
                    ("safety_copy", &safety_note),
                    ("snapshot_id", snapshot_id),
                    ("target", &target.display().to_string()),
                ],
            );
            return Err(RestoreError::verify_failed(&target)
                .with_details(format!("safety copy: {}", safety_note)));
        }

        Logger::info(
            "RESTORE_COMPLETE",
            &[
                ("snapshot_id", snapshot_id),
                ("target", &target.display().to_string()),
            ],
        );

        Ok(RestoreOutcome {
            snapshot_id: snapshot_id.to_string(),
            target,
            safety_copy,
        })
    }

    /// Claim exclusive access to a target path for the duration of a restore.
    fn claim(&self, target: &Path) -> RestoreResult<ClaimGuard<'_>> {
        let mut held = self
            .in_progress
            .lock()
            .map_err(|_| RestoreError::failed("restore guard poisoned"))?;

        if !held.insert(target.to_path_buf()) {
            return Err(RestoreError::in_progress(target));
        }

        Ok(ClaimGuard {
            held: &self.in_progress,
            target: target.to_path_buf(),
        })
    }
}

/// Releases the per-target claim when the restore attempt ends.
struct ClaimGuard<'a> {
    held: &'a Mutex<HashSet<PathBuf>>,
    target: PathBuf,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.target);
        }
    }
}

/// Timestamped sibling path for the pre-restore safety copy.
fn safety_copy_path(target: &Path) -> PathBuf {
    PathBuf::from(format!(
        "{}.safety-{}",
        target.display(),
        generate_snapshot_id()
    ))
}

/// Copy a file byte-for-byte with fsync on the destination.
fn copy_file_with_fsync(src: &Path, dst: &Path) -> RestoreResult<()> {
    let mut src_file = File::open(src).map_err(|e| RestoreError::io_error_at_path(src, e))?;
    let mut dst_file = File::create(dst).map_err(|e| RestoreError::io_error_at_path(dst, e))?;

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = src_file
            .read(&mut buffer)
            .map_err(|e| RestoreError::io_error_at_path(src, e))?;

        if bytes_read == 0 {
            break;
        }

        dst_file
            .write_all(&buffer[..bytes_read])
            .map_err(|e| RestoreError::io_error_at_path(dst, e))?;
    }

    dst_file
        .sync_all()
        .map_err(|e| RestoreError::io_error(format!("fsync failed for: {}", dst.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleConfig;
    use crate::store::{ChecksumFileOpener, ChecksumFileStore, StoreResult};
    use std::fs;
    use tempfile::TempDir;

    type FileCoordinator = RecoveryCoordinator<ChecksumFileStore, ChecksumFileOpener>;

    fn setup(body: &[u8]) -> (TempDir, Arc<LifecycleContext<ChecksumFileStore>>, FileCoordinator)
    {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("app.db");
        let store = ChecksumFileStore::create(&db_path, body).unwrap();

        let mut config = LifecycleConfig::for_store(&db_path);
        config.backup_dir = tmp.path().join("backups");

        let ctx = Arc::new(LifecycleContext::new(store, config));
        let snapshots = Arc::new(SnapshotStore::new(ctx.clone()).unwrap());
        let verifier = IntegrityVerifier::new(ctx.clone(), ChecksumFileOpener);
        let coordinator = RecoveryCoordinator::new(ctx.clone(), snapshots, verifier);

        (tmp, ctx, coordinator)
    }

    fn snapshots_of(ctx: &Arc<LifecycleContext<ChecksumFileStore>>) -> SnapshotStore<ChecksumFileStore> {
        SnapshotStore::new(ctx.clone()).unwrap()
    }

    #[test]
    fn test_restore_roundtrip() {
        let (_tmp, ctx, coordinator) = setup(b"generation one");
        let snapshots = snapshots_of(&ctx);

        let record = snapshots.create_snapshot("before change").unwrap();
        let original_bytes = fs::read(ctx.live_path()).unwrap();

        // Mutate the live store
        ChecksumFileStore::create(ctx.live_path(), b"generation two").unwrap();

        let outcome = coordinator.restore(&record.id, None).unwrap();

        assert_eq!(fs::read(ctx.live_path()).unwrap(), original_bytes);
        assert_eq!(outcome.snapshot_id, record.id);

        // The overwritten state is preserved in the safety copy
        let safety = outcome.safety_copy.expect("target existed, safety copy required");
        assert!(safety.exists());
        let safety_store = ChecksumFileStore::open(&safety).unwrap();
        assert!(safety_store.integrity_check().unwrap());
    }

    #[test]
    fn test_restore_unknown_id() {
        let (_tmp, _ctx, coordinator) = setup(b"data");

        let err = coordinator.restore("20990101T000000Z", None).unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::SnapshotNotFound);
    }

    #[test]
    fn test_restore_missing_artifact() {
        let (_tmp, ctx, coordinator) = setup(b"data");
        let snapshots = snapshots_of(&ctx);

        let record = snapshots.create_snapshot("doomed").unwrap();
        fs::remove_file(&record.artifact_path).unwrap();

        let err = coordinator.restore(&record.id, None).unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::SnapshotNotFound);
    }

    #[test]
    fn test_corrupt_artifact_rejected_and_live_untouched() {
        let (_tmp, ctx, coordinator) = setup(b"precious live data");
        let snapshots = snapshots_of(&ctx);

        let record = snapshots.create_snapshot("soon corrupt").unwrap();

        // Flip one byte in the artifact
        let mut bytes = fs::read(&record.artifact_path).unwrap();
        bytes[2] ^= 0x01;
        fs::write(&record.artifact_path, &bytes).unwrap();

        let live_before = fs::read(ctx.live_path()).unwrap();
        let err = coordinator.restore(&record.id, None).unwrap_err();

        assert_eq!(err.code(), RestoreErrorCode::CorruptSnapshot);
        // Byte-for-byte unchanged, and no safety copy was created
        assert_eq!(fs::read(ctx.live_path()).unwrap(), live_before);
        let strays: Vec<_> = fs::read_dir(ctx.live_path().parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("safety"))
            .collect();
        assert!(strays.is_empty());
    }

    #[test]
    fn test_checksum_drift_rejected_even_when_structurally_valid() {
        let (_tmp, ctx, coordinator) = setup(b"data");
        let snapshots = snapshots_of(&ctx);

        let record = snapshots.create_snapshot("tampered").unwrap();

        // Replace the artifact with a different but structurally valid file:
        // the trailer checks out, the sidecar checksum does not
        ChecksumFileStore::create(&record.artifact_path, b"different body").unwrap();

        let err = coordinator.restore(&record.id, None).unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::CorruptSnapshot);
        assert!(err.details().unwrap().contains("checksum mismatch"));
    }

    #[test]
    fn test_restore_to_fresh_target_has_no_safety_copy() {
        let (tmp, ctx, coordinator) = setup(b"data");
        let snapshots = snapshots_of(&ctx);

        let record = snapshots.create_snapshot("for export").unwrap();
        let target = tmp.path().join("exported.db");

        let outcome = coordinator.restore(&record.id, Some(&target)).unwrap();

        assert!(target.exists());
        assert!(outcome.safety_copy.is_none());
        assert_eq!(
            fs::read(&target).unwrap(),
            fs::read(&record.artifact_path).unwrap()
        );
    }

    #[test]
    fn test_concurrent_restore_on_same_target_rejected() {
        let (_tmp, ctx, coordinator) = setup(b"data");
        let snapshots = snapshots_of(&ctx);
        let record = snapshots.create_snapshot("contended").unwrap();

        let _held = coordinator.claim(ctx.live_path()).unwrap();

        let err = coordinator.restore(&record.id, None).unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::RestoreInProgress);
    }

    #[test]
    fn test_claim_released_after_failed_restore() {
        let (_tmp, _ctx, coordinator) = setup(b"data");

        // First attempt fails on an unknown id; the claim must not leak
        assert!(coordinator.restore("20990101T000000Z", None).is_err());
        assert!(coordinator.restore("20990101T000000Z", None).is_err());
    }

    /// Opener that fails verification for one specific path.
    struct FailingOpener {
        inner: ChecksumFileOpener,
        fail_for: PathBuf,
    }

    impl StoreOpener for FailingOpener {
        type Handle = ChecksumFileStore;

        fn open_read_only(&self, path: &Path) -> StoreResult<Self::Handle> {
            if path == self.fail_for {
                return Err(crate::store::StoreError::Unreachable(
                    "simulated post-copy corruption".to_string(),
                ));
            }
            self.inner.open_read_only(path)
        }
    }

    #[test]
    fn test_post_copy_verification_failure_reports_safety_copy() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("app.db");
        let store = ChecksumFileStore::create(&db_path, b"live").unwrap();

        let mut config = LifecycleConfig::for_store(&db_path);
        config.backup_dir = tmp.path().join("backups");

        let ctx = Arc::new(LifecycleContext::new(store, config));
        let snapshots = Arc::new(SnapshotStore::new(ctx.clone()).unwrap());
        let record = snapshots.create_snapshot("pending").unwrap();

        // The target itself fails verification after the copy
        let verifier = IntegrityVerifier::new(
            ctx.clone(),
            FailingOpener {
                inner: ChecksumFileOpener,
                fail_for: db_path.clone(),
            },
        );
        let coordinator = RecoveryCoordinator::new(ctx, snapshots, verifier);

        let err = coordinator.restore(&record.id, None).unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::VerifyFailed);
        // The error names the safety copy the operator can fall back to
        assert!(err.details().unwrap().contains("safety-"));
    }
}
