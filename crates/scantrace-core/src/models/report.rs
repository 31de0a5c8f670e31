//! Scan report data model
//!
//! Mirrors the nested JSON document produced by the compliance scanner. Only the
//! fields that feed span names and attributes are modelled; everything else is
//! kept in `extra` so the document serializes back out unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A complete scan run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Platform the scan ran against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    /// Scanner version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Profiles in execution order
    #[serde(default)]
    pub profiles: Vec<Profile>,

    /// Run-level statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,

    /// Fields not used for tracing
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Target platform identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    /// Platform name (e.g. "ubuntu")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Platform release; some platforms report it as a number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<Value>,

    /// Fields not used for tracing
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Run-level statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Wall-clock duration of the scan in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Fields not used for tracing
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A collection of controls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Short machine name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Profile version, usually a string but occasionally numeric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,

    /// Free-form profile attributes (inputs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,

    /// Controls in execution order
    #[serde(default)]
    pub controls: Vec<Control>,

    /// Fields not used for tracing
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single compliance rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Control {
    /// Control identifier (e.g. "cis-1.1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Control name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Description; null in some scanner versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<Value>,

    /// Severity between 0.0 and 1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<f64>,

    /// Results in execution order
    #[serde(default)]
    pub results: Vec<ScanResult>,

    /// Fields not used for tracing
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One evaluated outcome of a control
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResultStatus>,

    /// Human-readable description of the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_desc: Option<String>,

    /// Time spent on this check in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_time: Option<f64>,

    /// Fields not used for tracing
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of a check
///
/// Unknown statuses are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultStatus {
    /// Check succeeded
    Passed,
    /// Check failed
    Failed,
    /// Check was not run
    Skipped,
    /// Check could not be evaluated
    Error,
    /// Any other status string
    Other(String),
}

impl ResultStatus {
    /// The status as it appears in the report
    pub fn as_str(&self) -> &str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ResultStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "passed" => Self::Passed,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            "error" => Self::Error,
            _ => Self::Other(s),
        }
    }
}

impl From<ResultStatus> for String {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScanReport {
    /// Number of spans a run over this report produces, root included
    pub fn span_count(&self) -> usize {
        1 + self
            .profiles
            .iter()
            .map(|p| 1 + p.controls.iter().map(|c| 1 + c.results.len()).sum::<usize>())
            .sum::<usize>()
    }

    /// Scan duration converted to milliseconds
    pub fn duration_ms(&self) -> Option<f64> {
        self.statistics
            .as_ref()
            .and_then(|s| s.duration)
            .map(|secs| secs * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_deserialize_minimal() {
        let report: ScanReport = serde_json::from_value(json!({ "profiles": [] })).unwrap();
        assert!(report.platform.is_none());
        assert!(report.profiles.is_empty());
        assert_eq!(report.span_count(), 1);
        assert_eq!(report.duration_ms(), None);
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let doc = json!({
            "platform": { "name": "ubuntu", "release": "22.04", "target_id": "abc" },
            "version": "5.22.3",
            "profiles": [{
                "name": "baseline",
                "sha256": "deadbeef",
                "controls": [{
                    "id": "cis-1.1",
                    "tags": { "nist": ["AC-1"] },
                    "results": [{
                        "status": "passed",
                        "code_desc": "check passed",
                        "run_time": 0.02,
                        "start_time": "2024-01-01T00:00:00Z"
                    }]
                }]
            }],
            "statistics": { "duration": 1.5 },
            "other_checks": []
        });

        let report: ScanReport = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(serde_json::to_value(&report).unwrap(), doc);
    }

    #[test]
    fn test_status_parsing() {
        let statuses: Vec<ResultStatus> =
            serde_json::from_value(json!(["passed", "failed", "skipped", "error", "waived"]))
                .unwrap();
        assert_eq!(
            statuses,
            vec![
                ResultStatus::Passed,
                ResultStatus::Failed,
                ResultStatus::Skipped,
                ResultStatus::Error,
                ResultStatus::Other("waived".to_string()),
            ]
        );
        assert_eq!(statuses[4].to_string(), "waived");
    }

    #[test]
    fn test_span_count() {
        let report: ScanReport = serde_json::from_value(json!({
            "profiles": [
                { "controls": [ { "results": [{}, {}] }, { "results": [] } ] },
                { "controls": [] }
            ]
        }))
        .unwrap();
        // root + 2 profiles + 2 controls + 2 results
        assert_eq!(report.span_count(), 7);
    }

    #[test]
    fn test_duration_ms() {
        let report = ScanReport {
            statistics: Some(Statistics {
                duration: Some(1.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(report.duration_ms(), Some(1500.0));
    }
}
