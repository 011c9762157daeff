//! Typed configuration for the lifecycle manager
//!
//! Loaded once from a JSON file (`custodia.json` by convention) and carried
//! inside the [`crate::context::LifecycleContext`]. Every optional field has
//! a serde default so a minimal config only names the store file.
//!
//! Configuration problems are the one error class allowed to abort the
//! process: an unreadable config or an uncreatable backup directory fails
//! startup with exit code 2.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors. All fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("backup directory {path} not usable: {source}")]
    BackupDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("reports directory {path} not usable: {source}")]
    ReportsDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Retention policy for the snapshot sweep.
///
/// Both limits apply at once: a snapshot is deleted when it is older than
/// `max_age_days` OR falls outside the `max_count` most recent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetentionPolicy {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            max_count: default_max_count(),
        }
    }
}

fn default_max_age_days() -> u32 {
    30
}

fn default_max_count() -> usize {
    10
}

/// Cron expressions for the standard unattended jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSchedules {
    /// Daily snapshot
    #[serde(default = "default_daily")]
    pub daily: String,

    /// Weekly snapshot plus verification of the newest artifact
    #[serde(default = "default_weekly")]
    pub weekly: String,

    /// Monthly snapshot
    #[serde(default = "default_monthly")]
    pub monthly: String,

    /// Retention sweep
    #[serde(default = "default_cleanup")]
    pub cleanup: String,
}

impl Default for JobSchedules {
    fn default() -> Self {
        Self {
            daily: default_daily(),
            weekly: default_weekly(),
            monthly: default_monthly(),
            cleanup: default_cleanup(),
        }
    }
}

fn default_daily() -> String {
    "0 2 * * *".to_string()
}

fn default_weekly() -> String {
    "0 3 * * 0".to_string()
}

fn default_monthly() -> String {
    "0 4 1 * *".to_string()
}

fn default_cleanup() -> String {
    "30 2 * * *".to_string()
}

/// Top-level lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Path to the live store file
    pub db_path: PathBuf,

    /// Directory holding snapshot artifacts and sidecars
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Directory health reports are written to
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Tables every healthy deployment must have; also the latency sample set
    #[serde(default = "default_core_tables")]
    pub core_tables: Vec<String>,

    #[serde(default)]
    pub jobs: JobSchedules,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("./backups")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("./reports")
}

fn default_core_tables() -> Vec<String> {
    ["usuarios", "secciones", "actividades", "documentos", "mensajes"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl LifecycleConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Minimal config pointing at a store file, defaults everywhere else.
    pub fn for_store(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            backup_dir: default_backup_dir(),
            reports_dir: default_reports_dir(),
            retention: RetentionPolicy::default(),
            core_tables: default_core_tables(),
            jobs: JobSchedules::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custodia.json");
        fs::write(&path, br#"{"db_path": "./data/app.db"}"#).unwrap();

        let config = LifecycleConfig::load(&path).unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/app.db"));
        assert_eq!(config.backup_dir, PathBuf::from("./backups"));
        assert_eq!(config.retention.max_age_days, 30);
        assert_eq!(config.retention.max_count, 10);
        assert!(config.core_tables.contains(&"documentos".to_string()));
        assert_eq!(config.jobs.daily, "0 2 * * *");
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custodia.json");
        fs::write(
            &path,
            br#"{
                "db_path": "./app.db",
                "backup_dir": "/var/backups/app",
                "retention": {"max_age_days": 7, "max_count": 3},
                "jobs": {"daily": "15 1 * * *"}
            }"#,
        )
        .unwrap();

        let config = LifecycleConfig::load(&path).unwrap();

        assert_eq!(config.backup_dir, PathBuf::from("/var/backups/app"));
        assert_eq!(config.retention.max_age_days, 7);
        assert_eq!(config.retention.max_count, 3);
        assert_eq!(config.jobs.daily, "15 1 * * *");
        // Unspecified job schedules keep their defaults
        assert_eq!(config.jobs.cleanup, "30 2 * * *");
    }

    #[test]
    fn test_missing_config_file() {
        let result = LifecycleConfig::load(Path::new("/nonexistent/custodia.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custodia.json");
        fs::write(&path, b"not json at all").unwrap();

        let result = LifecycleConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_db_path_required() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custodia.json");
        fs::write(&path, b"{}").unwrap();

        let result = LifecycleConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
