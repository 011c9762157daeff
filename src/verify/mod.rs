//! Integrity verification
//!
//! Three independent probes against a store:
//!
//! - [`IntegrityVerifier::verify`] runs the engine's structural check on a
//!   target file opened read-only. The result is a plain `bool`: corruption
//!   detection must be total, so any failure to open or check counts as
//!   `false` and nothing escapes this boundary.
//! - [`IntegrityVerifier::check_referential`] scans the live store for
//!   foreign-key violations. It always runs in full; an `Err` means the scan
//!   did not run, which callers can distinguish from a clean empty list.
//! - [`IntegrityVerifier::check_configuration`] scores operational settings
//!   against known-good values with fixed weights.

use std::path::Path;
use std::sync::Arc;

use crate::context::LifecycleContext;
use crate::store::{StoreHandle, StoreOpener, StoreResult, Violation};

/// Weight deducted when foreign-key enforcement is off.
const WEIGHT_FOREIGN_KEYS: u8 = 30;

/// Weight deducted for non-write-ahead journaling.
const WEIGHT_JOURNAL_MODE: u8 = 20;

/// Weight deducted for an undersized page cache.
const WEIGHT_CACHE_SIZE: u8 = 10;

/// Minimum acceptable cache size, in pages.
const MIN_CACHE_PAGES: i64 = 2000;

/// Outcome of the configuration probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigReport {
    /// 0-100; each deviation subtracts its fixed weight, floored at 0
    pub score: u8,
    /// One human-readable issue per deviation
    pub issues: Vec<String>,
}

/// Runs structural, referential, and configuration checks.
pub struct IntegrityVerifier<S: StoreHandle, O: StoreOpener> {
    ctx: Arc<LifecycleContext<S>>,
    opener: O,
}

impl<S: StoreHandle, O: StoreOpener> IntegrityVerifier<S, O> {
    pub fn new(ctx: Arc<LifecycleContext<S>>, opener: O) -> Self {
        Self { ctx, opener }
    }

    /// Structural integrity of the file at `target`, opened read-only.
    ///
    /// Never panics and never returns an error: a target that cannot be
    /// opened or checked is simply not verified.
    pub fn verify(&self, target: &Path) -> bool {
        match self.opener.open_read_only(target) {
            Ok(handle) => handle.integrity_check().unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Full referential scan of the live store.
    ///
    /// An empty list means "verified clean". An `Err` means the scan did not
    /// run and must not be treated as clean.
    pub fn check_referential(&self) -> StoreResult<Vec<Violation>> {
        self.ctx.store.foreign_key_violations()
    }

    /// Score operational settings against known-good values.
    ///
    /// Deviations and weights: foreign keys disabled −30, journaling not
    /// write-ahead −20, cache under 2000 pages −10.
    pub fn check_configuration(&self) -> StoreResult<ConfigReport> {
        let mut score: u8 = 100;
        let mut issues = Vec::new();

        let foreign_keys = self
            .pragma("foreign_keys")?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        if foreign_keys != 1 {
            score = score.saturating_sub(WEIGHT_FOREIGN_KEYS);
            issues.push("foreign-key enforcement is disabled".to_string());
        }

        let journal_mode = self
            .pragma("journal_mode")?
            .and_then(|v| v.as_str().map(|s| s.to_ascii_lowercase()))
            .unwrap_or_default();
        if journal_mode != "wal" {
            score = score.saturating_sub(WEIGHT_JOURNAL_MODE);
            issues.push(format!(
                "journal mode is '{}'; write-ahead journaling recommended",
                if journal_mode.is_empty() {
                    "unknown"
                } else {
                    &journal_mode
                }
            ));
        }

        let cache_pages = self
            .pragma("cache_size")?
            .and_then(|v| v.as_i64())
            // Negative values express the cache in KB; normalize to pages
            .map(|v| v.abs())
            .unwrap_or(0);
        if cache_pages < MIN_CACHE_PAGES {
            score = score.saturating_sub(WEIGHT_CACHE_SIZE);
            issues.push(format!(
                "cache size {} pages is below the recommended {}",
                cache_pages, MIN_CACHE_PAGES
            ));
        }

        Ok(ConfigReport { score, issues })
    }

    /// Read a single-value pragma row.
    fn pragma(&self, name: &str) -> StoreResult<Option<serde_json::Value>> {
        let rows = self.ctx.store.query_all(&format!("PRAGMA {}", name), &[])?;
        Ok(rows.into_iter().next().and_then(|r| r.into_values().next()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleConfig;
    use crate::store::{
        ChecksumFileOpener, ChecksumFileStore, ExecOutcome, Row, StoreError,
    };
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Store whose pragmas and violations are fixed in the test.
    struct PragmaStore {
        pragmas: HashMap<String, serde_json::Value>,
        violations: Vec<Violation>,
        fail_referential: bool,
    }

    impl PragmaStore {
        fn healthy() -> Self {
            let mut pragmas = HashMap::new();
            pragmas.insert("foreign_keys".to_string(), serde_json::json!(1));
            pragmas.insert("journal_mode".to_string(), serde_json::json!("wal"));
            pragmas.insert("cache_size".to_string(), serde_json::json!(-2000));
            Self {
                pragmas,
                violations: Vec::new(),
                fail_referential: false,
            }
        }
    }

    impl StoreHandle for PragmaStore {
        fn query_all(&self, sql: &str, _params: &[serde_json::Value]) -> StoreResult<Vec<Row>> {
            let name = sql.strip_prefix("PRAGMA ").ok_or_else(|| StoreError::Query {
                sql: sql.to_string(),
                message: "unexpected query".to_string(),
            })?;

            match self.pragmas.get(name) {
                Some(value) => {
                    let mut row = Row::new();
                    row.insert(name.to_string(), value.clone());
                    Ok(vec![row])
                }
                None => Ok(Vec::new()),
            }
        }

        fn exec(&self, _sql: &str, _params: &[serde_json::Value]) -> StoreResult<ExecOutcome> {
            Err(StoreError::Unsupported("exec"))
        }

        fn integrity_check(&self) -> StoreResult<bool> {
            Ok(true)
        }

        fn foreign_key_violations(&self) -> StoreResult<Vec<Violation>> {
            if self.fail_referential {
                return Err(StoreError::Unreachable("store is locked".to_string()));
            }
            Ok(self.violations.clone())
        }

        fn table_names(&self) -> StoreResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn snapshot_to(&self, _dest: &Path) -> StoreResult<()> {
            Err(StoreError::Unsupported("snapshot_to"))
        }
    }

    fn verifier_for(store: PragmaStore) -> IntegrityVerifier<PragmaStore, ChecksumFileOpener> {
        let config = LifecycleConfig::for_store("/tmp/unused.db");
        IntegrityVerifier::new(
            Arc::new(LifecycleContext::new(store, config)),
            ChecksumFileOpener,
        )
    }

    #[test]
    fn test_verify_valid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snap.db");
        ChecksumFileStore::create(&path, b"consistent contents").unwrap();

        let verifier = verifier_for(PragmaStore::healthy());
        assert!(verifier.verify(&path));
    }

    #[test]
    fn test_verify_flipped_byte_is_false() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snap.db");
        ChecksumFileStore::create(&path, b"consistent contents").unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[5] ^= 0x01;
        fs::write(&path, &bytes).unwrap();

        let verifier = verifier_for(PragmaStore::healthy());
        assert!(!verifier.verify(&path));
    }

    #[test]
    fn test_verify_missing_file_is_false_not_panic() {
        let verifier = verifier_for(PragmaStore::healthy());
        assert!(!verifier.verify(Path::new("/nonexistent/snap.db")));
    }

    #[test]
    fn test_referential_clean() {
        let verifier = verifier_for(PragmaStore::healthy());
        assert!(verifier.check_referential().unwrap().is_empty());
    }

    #[test]
    fn test_referential_reports_violations() {
        let mut store = PragmaStore::healthy();
        store.violations.push(Violation {
            table: "documentos".to_string(),
            row_id: 17,
            parent_table: "usuarios".to_string(),
            parent_column: "id".to_string(),
        });

        let verifier = verifier_for(store);
        let violations = verifier.check_referential().unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].table, "documentos");
        assert_eq!(violations[0].row_id, 17);
    }

    #[test]
    fn test_referential_not_run_is_err_not_empty() {
        let mut store = PragmaStore::healthy();
        store.fail_referential = true;

        let verifier = verifier_for(store);
        assert!(verifier.check_referential().is_err());
    }

    #[test]
    fn test_configuration_all_good() {
        let verifier = verifier_for(PragmaStore::healthy());
        let report = verifier.check_configuration().unwrap();

        assert_eq!(report.score, 100);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_configuration_foreign_keys_off() {
        let mut store = PragmaStore::healthy();
        store
            .pragmas
            .insert("foreign_keys".to_string(), serde_json::json!(0));

        let report = verifier_for(store).check_configuration().unwrap();
        assert_eq!(report.score, 70);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].contains("foreign-key"));
    }

    #[test]
    fn test_configuration_journal_mode_delete() {
        let mut store = PragmaStore::healthy();
        store
            .pragmas
            .insert("journal_mode".to_string(), serde_json::json!("delete"));

        let report = verifier_for(store).check_configuration().unwrap();
        assert_eq!(report.score, 80);
        assert!(report.issues[0].contains("delete"));
    }

    #[test]
    fn test_configuration_small_cache() {
        let mut store = PragmaStore::healthy();
        store
            .pragmas
            .insert("cache_size".to_string(), serde_json::json!(-500));

        let report = verifier_for(store).check_configuration().unwrap();
        assert_eq!(report.score, 90);
        assert!(report.issues[0].contains("cache size"));
    }

    #[test]
    fn test_configuration_everything_wrong_floors_at_40() {
        let mut store = PragmaStore::healthy();
        store
            .pragmas
            .insert("foreign_keys".to_string(), serde_json::json!(0));
        store
            .pragmas
            .insert("journal_mode".to_string(), serde_json::json!("delete"));
        store
            .pragmas
            .insert("cache_size".to_string(), serde_json::json!(0));

        let report = verifier_for(store).check_configuration().unwrap();
        assert_eq!(report.score, 40);
        assert_eq!(report.issues.len(), 3);
    }

    #[test]
    fn test_configuration_missing_pragmas_count_as_deviations() {
        let store = PragmaStore {
            pragmas: HashMap::new(),
            violations: Vec::new(),
            fail_referential: false,
        };

        let report = verifier_for(store).check_configuration().unwrap();
        assert_eq!(report.score, 40);
    }

    #[test]
    fn test_configuration_unreachable_store_is_err() {
        struct DeadStore;
        impl StoreHandle for DeadStore {
            fn query_all(
                &self,
                _sql: &str,
                _params: &[serde_json::Value],
            ) -> StoreResult<Vec<Row>> {
                Err(StoreError::Unreachable("gone".to_string()))
            }
            fn exec(
                &self,
                _sql: &str,
                _params: &[serde_json::Value],
            ) -> StoreResult<ExecOutcome> {
                Err(StoreError::Unsupported("exec"))
            }
            fn integrity_check(&self) -> StoreResult<bool> {
                Err(StoreError::Unreachable("gone".to_string()))
            }
            fn foreign_key_violations(&self) -> StoreResult<Vec<Violation>> {
                Err(StoreError::Unreachable("gone".to_string()))
            }
            fn table_names(&self) -> StoreResult<Vec<String>> {
                Err(StoreError::Unreachable("gone".to_string()))
            }
            fn snapshot_to(&self, _dest: &Path) -> StoreResult<()> {
                Err(StoreError::Unreachable("gone".to_string()))
            }
        }

        let config = LifecycleConfig::for_store("/tmp/unused.db");
        let verifier = IntegrityVerifier::new(
            Arc::new(LifecycleContext::new(DeadStore, config)),
            ChecksumFileOpener,
        );

        assert!(verifier.check_configuration().is_err());
    }
}
