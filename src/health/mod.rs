//! Health scoring for the managed store.
//!
//! [`HealthScorer::run`] executes a fixed battery of independent checks and
//! folds them into one graded report. Every check function returns a
//! [`HealthCheckResult`] no matter what happens underneath; a failing probe
//! degrades its own check and never aborts the run, so the report always
//! covers the full battery.
//!
//! Stores that cannot answer a probe (no query surface, no catalog) get a
//! `warn` for that check rather than a hard failure.

mod report;
mod validation;

pub use report::{CheckStatus, HealthBand, HealthCheckResult, HealthReport};
pub use validation::{default_probes, BasicValidation, ValidationLayer, ValidationProbe};

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;

use crate::config::ConfigError;
use crate::context::LifecycleContext;
use crate::observability::Logger;
use crate::snapshot::SnapshotStore;
use crate::store::{StoreError, StoreHandle, StoreOpener};
use crate::verify::IntegrityVerifier;

/// Latency thresholds, in milliseconds.
const LATENCY_FAST_AVG_MS: f64 = 5.0;
const LATENCY_SLOW_SAMPLE_MS: f64 = 10.0;
const LATENCY_WARN_AVG_MS: f64 = 15.0;

/// Backup freshness thresholds.
const FRESHNESS_MIN_SNAPSHOTS: usize = 3;
const FRESHNESS_MAX_AGE_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write health report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize health report: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type HealthResult<T> = Result<T, HealthError>;

/// Runs the check battery and grades the store.
pub struct HealthScorer<S: StoreHandle, O: StoreOpener, V: ValidationLayer> {
    ctx: Arc<LifecycleContext<S>>,
    snapshots: Arc<SnapshotStore<S>>,
    verifier: IntegrityVerifier<S, O>,
    validation: V,
    probes: Vec<ValidationProbe>,
}

impl<S: StoreHandle, O: StoreOpener, V: ValidationLayer> HealthScorer<S, O, V> {
    pub fn new(
        ctx: Arc<LifecycleContext<S>>,
        snapshots: Arc<SnapshotStore<S>>,
        verifier: IntegrityVerifier<S, O>,
        validation: V,
        probes: Vec<ValidationProbe>,
    ) -> Self {
        Self {
            ctx,
            snapshots,
            verifier,
            validation,
            probes,
        }
    }

    /// Run the full battery and aggregate the results.
    pub fn run(&self) -> HealthReport {
        let checks = vec![
            self.check_access(),
            self.check_configuration(),
            self.check_structure(),
            self.check_latency(),
            self.check_backup_freshness(),
            self.check_validation(),
        ];

        let total = checks.len() as u32;
        let pass = checks.iter().filter(|c| c.status == CheckStatus::Pass).count() as u32;
        let warn = checks.iter().filter(|c| c.status == CheckStatus::Warn).count() as u32;
        let any_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);

        let health_score = ((pass * 100 + warn * 60) / total) as u8;
        let overall_status = if any_fail {
            HealthBand::Critical
        } else {
            HealthBand::from_score(health_score)
        };

        let recommendations = recommendations(&checks);

        Logger::info(
            "HEALTH_REPORT",
            &[
                ("score", &health_score.to_string()),
                ("status", &overall_status.to_string()),
            ],
        );

        HealthReport {
            timestamp: Utc::now(),
            overall_status,
            health_score,
            checks,
            recommendations,
        }
    }

    /// Write a report to the configured reports directory.
    pub fn write_report(&self, report: &HealthReport) -> HealthResult<PathBuf> {
        let dir = &self.ctx.config.reports_dir;
        fs::create_dir_all(dir).map_err(|e| ConfigError::ReportsDir {
            path: dir.clone(),
            source: e,
        })?;

        let stem = report.timestamp.format("%Y%m%dT%H%M%SZ");
        let path = dir.join(format!("health-{}.json", stem));

        let json = report.to_json()?;
        let mut file = File::create(&path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        Logger::info(
            "HEALTH_REPORT_WRITTEN",
            &[("path", &path.display().to_string())],
        );
        Ok(path)
    }

    /// Check 1: store file reachability and permissions.
    fn check_access(&self) -> HealthCheckResult {
        let path = self.ctx.live_path();
        match fs::metadata(path) {
            Ok(meta) if !meta.is_file() => {
                HealthCheckResult::fail("access", format!("{} is not a file", path.display()))
            }
            Ok(meta) if meta.permissions().readonly() => HealthCheckResult::warn(
                "access",
                format!("{} is read-only; writes will fail", path.display()),
            ),
            Ok(meta) => HealthCheckResult::pass("access", "store file is readable and writable")
                .with_detail("size_bytes", serde_json::json!(meta.len())),
            Err(e) => HealthCheckResult::fail(
                "access",
                format!("store file unreachable at {}: {}", path.display(), e),
            ),
        }
    }

    /// Check 2: operational configuration score.
    fn check_configuration(&self) -> HealthCheckResult {
        match self.verifier.check_configuration() {
            Ok(config) => {
                let message = if config.issues.is_empty() {
                    format!("configuration score {}", config.score)
                } else {
                    format!(
                        "configuration score {} with {} issue(s)",
                        config.score,
                        config.issues.len()
                    )
                };
                let result = match config.score {
                    90..=100 => HealthCheckResult::pass("configuration", message),
                    70..=89 => HealthCheckResult::warn("configuration", message),
                    _ => HealthCheckResult::fail("configuration", message),
                };
                result
                    .with_detail("score", serde_json::json!(config.score))
                    .with_detail("issues", serde_json::json!(config.issues))
            }
            Err(StoreError::Unsupported(what)) => HealthCheckResult::warn(
                "configuration",
                format!("store does not support {}; configuration not scored", what),
            ),
            Err(e) => {
                HealthCheckResult::fail("configuration", format!("configuration probe failed: {}", e))
            }
        }
    }

    /// Check 3: structural integrity, referential violations, expected tables.
    fn check_structure(&self) -> HealthCheckResult {
        if !self.verifier.verify(self.ctx.live_path()) {
            return HealthCheckResult::fail("structure", "structural integrity check failed");
        }

        let violations = match self.verifier.check_referential() {
            Ok(v) => v,
            Err(StoreError::Unsupported(_)) => Vec::new(),
            Err(e) => {
                return HealthCheckResult::fail(
                    "structure",
                    format!("referential scan failed: {}", e),
                )
            }
        };
        if !violations.is_empty() {
            return HealthCheckResult::fail(
                "structure",
                format!("{} referential violation(s) found", violations.len()),
            )
            .with_detail("violations", serde_json::json!(violations));
        }

        match self.ctx.store.table_names() {
            Ok(tables) => {
                let missing: Vec<&String> = self
                    .ctx
                    .config
                    .core_tables
                    .iter()
                    .filter(|t| !tables.contains(t))
                    .collect();
                if !missing.is_empty() {
                    return HealthCheckResult::fail(
                        "structure",
                        format!("expected table(s) missing: {:?}", missing),
                    );
                }

                let extra = tables
                    .iter()
                    .filter(|t| !self.ctx.config.core_tables.contains(t))
                    .count();
                if extra > 0 {
                    return HealthCheckResult::warn(
                        "structure",
                        format!("{} table(s) beyond the expected core set", extra),
                    )
                    .with_detail("table_count", serde_json::json!(tables.len()));
                }

                HealthCheckResult::pass("structure", "integrity verified, no violations")
            }
            Err(StoreError::Unsupported(_)) => HealthCheckResult::warn(
                "structure",
                "integrity verified; catalog unavailable for table presence check",
            ),
            Err(e) => {
                HealthCheckResult::fail("structure", format!("catalog listing failed: {}", e))
            }
        }
    }

    /// Check 4: wall-clock latency of a trivial count per core table.
    fn check_latency(&self) -> HealthCheckResult {
        let tables = &self.ctx.config.core_tables;
        if tables.is_empty() {
            return HealthCheckResult::warn("latency", "no core tables configured for sampling");
        }

        let mut result = HealthCheckResult::pass("latency", String::new());
        let mut samples_ms: Vec<f64> = Vec::new();
        let mut failed = 0usize;

        for table in tables {
            let sql = format!("SELECT COUNT(*) AS n FROM \"{}\"", table);
            let started = Instant::now();
            match self.ctx.store.query_all(&sql, &[]) {
                Ok(_) => {
                    let ms = started.elapsed().as_secs_f64() * 1000.0;
                    result = result
                        .with_detail(table, serde_json::json!(format!("{:.2}ms", ms)));
                    samples_ms.push(ms);
                }
                Err(StoreError::Unsupported(what)) => {
                    return HealthCheckResult::warn(
                        "latency",
                        format!("store does not support {}; latency not sampled", what),
                    );
                }
                // A single table's failure is a failed sample, not a crash
                Err(e) => {
                    failed += 1;
                    result = result
                        .with_detail(table, serde_json::json!(format!("failed: {}", e)));
                }
            }
        }

        let avg = if samples_ms.is_empty() {
            f64::INFINITY
        } else {
            samples_ms.iter().sum::<f64>() / samples_ms.len() as f64
        };
        let slow = samples_ms
            .iter()
            .filter(|ms| **ms > LATENCY_SLOW_SAMPLE_MS)
            .count()
            + failed;

        if avg < LATENCY_FAST_AVG_MS && slow == 0 {
            result.message = format!("average {:.2}ms across {} table(s)", avg, tables.len());
            result
        } else if avg < LATENCY_WARN_AVG_MS && slow <= 1 {
            result.status = CheckStatus::Warn;
            result.message = format!("average {:.2}ms with {} slow sample(s)", avg, slow);
            result
        } else {
            result.status = CheckStatus::Fail;
            result.message = format!(
                "latency degraded: average {:.2}ms, {} slow or failed sample(s)",
                avg, slow
            );
            result
        }
    }

    /// Check 5: snapshot count and age of the newest one.
    fn check_backup_freshness(&self) -> HealthCheckResult {
        let snapshots = match self.snapshots.list_snapshots() {
            Ok(s) => s,
            Err(e) => {
                return HealthCheckResult::fail(
                    "backup_freshness",
                    format!("could not list snapshots: {}", e),
                )
            }
        };

        if snapshots.is_empty() {
            return HealthCheckResult::fail("backup_freshness", "no snapshots exist");
        }

        // list_snapshots returns newest first
        let newest_age = snapshots[0].age_days(Utc::now());
        let result = if snapshots.len() >= FRESHNESS_MIN_SNAPSHOTS
            && newest_age < FRESHNESS_MAX_AGE_DAYS
        {
            HealthCheckResult::pass(
                "backup_freshness",
                format!(
                    "{} snapshot(s), newest {} day(s) old",
                    snapshots.len(),
                    newest_age
                ),
            )
        } else {
            HealthCheckResult::warn(
                "backup_freshness",
                format!(
                    "{} snapshot(s), newest {} day(s) old; want >={} snapshots under {} days",
                    snapshots.len(),
                    newest_age,
                    FRESHNESS_MIN_SNAPSHOTS,
                    FRESHNESS_MAX_AGE_DAYS
                ),
            )
        };
        result
            .with_detail("count", serde_json::json!(snapshots.len()))
            .with_detail("newest_age_days", serde_json::json!(newest_age))
    }

    /// Check 6: probe the validation layer with known-good and known-bad rows.
    fn check_validation(&self) -> HealthCheckResult {
        if self.probes.is_empty() {
            return HealthCheckResult::warn("validation", "no validation probes configured");
        }

        let mut regressions = Vec::new();
        for probe in &self.probes {
            if self
                .validation
                .validate_create(&probe.entity, &probe.good)
                .is_err()
            {
                regressions.push(format!("{}: known-good record rejected", probe.entity));
            }
            if self
                .validation
                .validate_create(&probe.entity, &probe.bad)
                .is_ok()
            {
                regressions.push(format!("{}: known-bad record accepted", probe.entity));
            }
        }

        if regressions.is_empty() {
            HealthCheckResult::pass(
                "validation",
                format!("{} entity type(s) probed", self.probes.len()),
            )
        } else {
            HealthCheckResult::fail(
                "validation",
                format!("{} validation regression(s)", regressions.len()),
            )
            .with_detail("regressions", serde_json::json!(regressions))
        }
    }
}

/// Remediation hints derived purely from the check results, so the same
/// results always produce the same recommendations.
fn recommendations(checks: &[HealthCheckResult]) -> Vec<String> {
    let mut out = Vec::new();
    for check in checks {
        if check.status == CheckStatus::Pass {
            continue;
        }
        match check.name.as_str() {
            "access" => out.push("restore read/write access to the store file".to_string()),
            "configuration" => {
                let issues = check
                    .details
                    .get("issues")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default();
                let mut matched = false;
                for issue in &issues {
                    let text = issue.as_str().unwrap_or("");
                    if text.contains("foreign-key") {
                        out.push("enable foreign-key enforcement".to_string());
                        matched = true;
                    } else if text.contains("journal") {
                        out.push("switch to write-ahead journaling".to_string());
                        matched = true;
                    } else if text.contains("cache") {
                        out.push("increase the page cache size".to_string());
                        matched = true;
                    }
                }
                if !matched {
                    out.push("review store configuration".to_string());
                }
            }
            "structure" => {
                out.push("run a structural repair and resolve referential violations".to_string())
            }
            "latency" => out.push("investigate slow queries against core tables".to_string()),
            "backup_freshness" => {
                out.push("create a fresh snapshot and enable the daily backup job".to_string())
            }
            "validation" => out.push("review the validation layer for regressions".to_string()),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleConfig;
    use crate::store::{ExecOutcome, Row, StoreResult, Violation};
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Store whose probe answers are scripted per test.
    #[derive(Clone)]
    struct ScriptedStore {
        pragmas: HashMap<String, serde_json::Value>,
        tables: Vec<String>,
        violations: Vec<Violation>,
        fail_tables: Vec<String>,
        intact: bool,
    }

    impl ScriptedStore {
        fn healthy() -> Self {
            let mut pragmas = HashMap::new();
            pragmas.insert("foreign_keys".to_string(), serde_json::json!(1));
            pragmas.insert("journal_mode".to_string(), serde_json::json!("wal"));
            pragmas.insert("cache_size".to_string(), serde_json::json!(-4000));
            Self {
                pragmas,
                tables: LifecycleConfig::for_store("x").core_tables,
                violations: Vec::new(),
                fail_tables: Vec::new(),
                intact: true,
            }
        }
    }

    impl StoreHandle for ScriptedStore {
        fn query_all(&self, sql: &str, _params: &[serde_json::Value]) -> StoreResult<Vec<Row>> {
            if let Some(name) = sql.strip_prefix("PRAGMA ") {
                let mut row = Row::new();
                if let Some(value) = self.pragmas.get(name) {
                    row.insert(name.to_string(), value.clone());
                }
                return Ok(vec![row]);
            }
            for table in &self.fail_tables {
                if sql.contains(&format!("\"{}\"", table)) {
                    return Err(StoreError::Query {
                        sql: sql.to_string(),
                        message: "disk I/O error".to_string(),
                    });
                }
            }
            let mut row = Row::new();
            row.insert("n".to_string(), serde_json::json!(7));
            Ok(vec![row])
        }

        fn exec(&self, _sql: &str, _params: &[serde_json::Value]) -> StoreResult<ExecOutcome> {
            Ok(ExecOutcome {
                changed: 0,
                last_id: None,
            })
        }

        fn integrity_check(&self) -> StoreResult<bool> {
            Ok(self.intact)
        }

        fn foreign_key_violations(&self) -> StoreResult<Vec<Violation>> {
            Ok(self.violations.clone())
        }

        fn table_names(&self) -> StoreResult<Vec<String>> {
            Ok(self.tables.clone())
        }

        fn snapshot_to(&self, dest: &Path) -> StoreResult<()> {
            fs::write(dest, b"scripted snapshot body")?;
            Ok(())
        }
    }

    struct ScriptedOpener(ScriptedStore);

    impl StoreOpener for ScriptedOpener {
        type Handle = ScriptedStore;

        fn open_read_only(&self, _path: &Path) -> StoreResult<Self::Handle> {
            Ok(self.0.clone())
        }
    }

    type Scorer = HealthScorer<ScriptedStore, ScriptedOpener, BasicValidation>;

    fn scorer_for(store: ScriptedStore) -> (TempDir, Scorer) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("app.db");
        fs::write(&db_path, b"live").unwrap();

        let mut config = LifecycleConfig::for_store(&db_path);
        config.backup_dir = tmp.path().join("backups");
        config.reports_dir = tmp.path().join("reports");

        let ctx = Arc::new(LifecycleContext::new(store.clone(), config));
        let snapshots = Arc::new(SnapshotStore::new(ctx.clone()).unwrap());
        let verifier = IntegrityVerifier::new(ctx.clone(), ScriptedOpener(store));
        let scorer = HealthScorer::new(ctx, snapshots, verifier, BasicValidation, default_probes());
        (tmp, scorer)
    }

    #[test]
    fn test_healthy_store_scores_excellent() {
        let (_tmp, scorer) = scorer_for(ScriptedStore::healthy());

        // Three snapshots so freshness passes
        for i in 0..3 {
            scorer
                .snapshots
                .create_snapshot(&format!("probe {}", i))
                .unwrap();
        }

        let report = scorer.run();
        assert_eq!(report.overall_status, HealthBand::Excellent);
        assert!(report.health_score >= 90);
        assert_eq!(report.checks.len(), 6);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_no_snapshots_is_critical() {
        let (_tmp, scorer) = scorer_for(ScriptedStore::healthy());

        let report = scorer.run();
        assert_eq!(report.overall_status, HealthBand::Critical);
        let freshness = report
            .checks
            .iter()
            .find(|c| c.name == "backup_freshness")
            .unwrap();
        assert_eq!(freshness.status, CheckStatus::Fail);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("fresh snapshot")));
    }

    #[test]
    fn test_single_table_failure_is_isolated() {
        let mut store = ScriptedStore::healthy();
        store.fail_tables = vec!["documentos".to_string()];
        let (_tmp, scorer) = scorer_for(store);

        let report = scorer.run();

        // Every check still ran
        assert_eq!(report.checks.len(), 6);

        let latency = report.checks.iter().find(|c| c.name == "latency").unwrap();
        // One failed sample degrades to warn, not fail
        assert_eq!(latency.status, CheckStatus::Warn);
        let detail = latency.details.get("documentos").unwrap();
        assert!(detail.as_str().unwrap().starts_with("failed:"));
        // Other tables have real samples
        assert!(latency.details.get("usuarios").is_some());
    }

    #[test]
    fn test_foreign_keys_off_recommends_enforcement() {
        let mut store = ScriptedStore::healthy();
        store
            .pragmas
            .insert("foreign_keys".to_string(), serde_json::json!(0));
        let (_tmp, scorer) = scorer_for(store);

        let check = scorer.check_configuration();
        assert_eq!(check.status, CheckStatus::Warn);

        let report = scorer.run();
        assert!(report
            .recommendations
            .contains(&"enable foreign-key enforcement".to_string()));
    }

    #[test]
    fn test_referential_violations_fail_structure() {
        let mut store = ScriptedStore::healthy();
        store.violations = vec![Violation {
            table: "mensajes".to_string(),
            row_id: 12,
            parent_table: "usuarios".to_string(),
            parent_column: "id".to_string(),
        }];
        let (_tmp, scorer) = scorer_for(store);

        let check = scorer.check_structure();
        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.message.contains("1 referential violation"));
    }

    #[test]
    fn test_missing_core_table_fails_structure() {
        let mut store = ScriptedStore::healthy();
        store.tables.retain(|t| t != "actividades");
        let (_tmp, scorer) = scorer_for(store);

        let check = scorer.check_structure();
        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.message.contains("actividades"));
    }

    #[test]
    fn test_corrupt_store_fails_structure() {
        let mut store = ScriptedStore::healthy();
        store.intact = false;
        let (_tmp, scorer) = scorer_for(store);

        let check = scorer.check_structure();
        assert_eq!(check.status, CheckStatus::Fail);
    }

    #[test]
    fn test_broken_validator_fails_self_test() {
        struct AcceptsEverything;
        impl ValidationLayer for AcceptsEverything {
            fn validate_create(&self, _entity: &str, _data: &Row) -> Result<(), String> {
                Ok(())
            }
        }

        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("app.db");
        fs::write(&db_path, b"live").unwrap();
        let store = ScriptedStore::healthy();

        let mut config = LifecycleConfig::for_store(&db_path);
        config.backup_dir = tmp.path().join("backups");

        let ctx = Arc::new(LifecycleContext::new(store.clone(), config));
        let snapshots = Arc::new(SnapshotStore::new(ctx.clone()).unwrap());
        let verifier = IntegrityVerifier::new(ctx.clone(), ScriptedOpener(store));
        let scorer =
            HealthScorer::new(ctx, snapshots, verifier, AcceptsEverything, default_probes());

        let check = scorer.check_validation();
        assert_eq!(check.status, CheckStatus::Fail);
        let regressions = check.details.get("regressions").unwrap();
        assert!(regressions
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r.as_str().unwrap().contains("known-bad record accepted")));
    }

    #[test]
    fn test_write_report_creates_reports_dir() {
        let (tmp, scorer) = scorer_for(ScriptedStore::healthy());

        let report = scorer.run();
        let path = scorer.write_report(&report).unwrap();

        assert!(path.starts_with(tmp.path().join("reports")));
        let parsed = HealthReport::from_json(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.checks.len(), 6);
    }
}
