//! Health report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of a single named check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "pass"),
            CheckStatus::Warn => write!(f, "warn"),
            CheckStatus::Fail => write!(f, "fail"),
        }
    }
}

/// One check's result, built fresh on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl HealthCheckResult {
    pub fn pass(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Pass, message)
    }

    pub fn warn(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Warn, message)
    }

    pub fn fail(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Fail, message)
    }

    fn with_status(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Overall grade derived from the weighted check score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthBand {
    /// Band for a 0-100 score with no failing checks.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=100 => HealthBand::Excellent,
            75..=89 => HealthBand::Good,
            60..=74 => HealthBand::Fair,
            _ => HealthBand::Poor,
        }
    }

    /// Exit code for schedulers wrapping the CLI: 0 means fine, 1 means
    /// degraded, 2 means page someone.
    pub fn exit_code(&self) -> i32 {
        match self {
            HealthBand::Excellent | HealthBand::Good => 0,
            HealthBand::Fair | HealthBand::Poor => 1,
            HealthBand::Critical => 2,
        }
    }
}

impl fmt::Display for HealthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthBand::Excellent => write!(f, "excellent"),
            HealthBand::Good => write!(f, "good"),
            HealthBand::Fair => write!(f, "fair"),
            HealthBand::Poor => write!(f, "poor"),
            HealthBand::Critical => write!(f, "critical"),
        }
    }
}

/// Aggregate of one scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub overall_status: HealthBand,
    pub health_score: u8,
    pub checks: Vec<HealthCheckResult>,
    pub recommendations: Vec<String>,
}

impl HealthReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_from_score() {
        assert_eq!(HealthBand::from_score(100), HealthBand::Excellent);
        assert_eq!(HealthBand::from_score(90), HealthBand::Excellent);
        assert_eq!(HealthBand::from_score(89), HealthBand::Good);
        assert_eq!(HealthBand::from_score(75), HealthBand::Good);
        assert_eq!(HealthBand::from_score(74), HealthBand::Fair);
        assert_eq!(HealthBand::from_score(60), HealthBand::Fair);
        assert_eq!(HealthBand::from_score(59), HealthBand::Poor);
        assert_eq!(HealthBand::from_score(0), HealthBand::Poor);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(HealthBand::Excellent.exit_code(), 0);
        assert_eq!(HealthBand::Good.exit_code(), 0);
        assert_eq!(HealthBand::Fair.exit_code(), 1);
        assert_eq!(HealthBand::Poor.exit_code(), 1);
        assert_eq!(HealthBand::Critical.exit_code(), 2);
    }

    #[test]
    fn test_report_serializes_lowercase() {
        let report = HealthReport {
            timestamp: Utc::now(),
            overall_status: HealthBand::Critical,
            health_score: 33,
            checks: vec![HealthCheckResult::fail("structure", "violations found")],
            recommendations: vec!["resolve referential violations".to_string()],
        };

        let json = report.to_json().unwrap();
        assert!(json.contains("\"critical\""));
        assert!(json.contains("\"fail\""));

        let parsed = HealthReport::from_json(&json).unwrap();
        assert_eq!(parsed.overall_status, HealthBand::Critical);
        assert_eq!(parsed.checks[0].status, CheckStatus::Fail);
    }

    #[test]
    fn test_empty_details_omitted() {
        let result = HealthCheckResult::pass("access", "ok");
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("details"));

        let with = result.with_detail("size_bytes", serde_json::json!(42));
        let json = serde_json::to_string(&with).unwrap();
        assert!(json.contains("\"size_bytes\":42"));
    }
}
