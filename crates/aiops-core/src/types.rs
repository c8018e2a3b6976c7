//! Domain types for the control loop.
//!
//! Everything here is transient: produced during a tick, consumed by
//! the next stage, and dropped. Nothing is persisted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ── Load ───────────────────────────────────────────────────────────

/// Aggregate CPU consumption rate observed in one tick.
///
/// Always finite and non-negative. [`LoadSample::NO_DATA`] (zero) stands
/// in for a missing reading, so a metrics outage reads as "no load".
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct LoadSample(f64);

impl LoadSample {
    /// Sentinel for "no valid reading this tick".
    pub const NO_DATA: LoadSample = LoadSample(0.0);

    /// Wrap a raw reading. Returns `None` for NaN, infinities and
    /// negative values.
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value >= 0.0).then_some(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_no_data(self) -> bool {
        self.0 == 0.0
    }

    /// Strictly greater than `threshold`. No normalization is applied.
    pub fn exceeds(self, threshold: f64) -> bool {
        self.0 > threshold
    }
}

impl fmt::Display for LoadSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Metrics backend payloads ───────────────────────────────────────

/// Response of an instant query against the metrics backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResponse {
    /// Backend-reported status; `"success"` on a good query.
    pub status: String,
    pub series: Vec<Series>,
}

impl QueryResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// One labelled value in a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

/// Unit attached to a pushed telemetry datapoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Percent,
    Count,
    None,
}

// ── Workload ───────────────────────────────────────────────────────

/// Orchestrator's view of one running workload instance (a pod).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkloadInstance {
    pub id: String,
    pub labels: BTreeMap<String, String>,
    /// Highest restart count across the instance's containers.
    pub restart_count: u32,
}

impl WorkloadInstance {
    pub fn new(id: impl Into<String>, restart_count: u32) -> Self {
        Self {
            id: id.into(),
            labels: BTreeMap::new(),
            restart_count,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Equality selector over instance labels, written `key=value`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl LabelSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        labels.get(&self.key).is_some_and(|v| *v == self.value)
    }
}

impl FromStr for LabelSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| format!("selector {s:?} is not of the form key=value"))?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(format!("selector {s:?} has an empty key or value"));
        }
        Ok(Self::new(key, value))
    }
}

impl TryFrom<String> for LabelSelector {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

// ── Scaling ────────────────────────────────────────────────────────

/// Outcome of one escalation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    /// Load at or below threshold; nothing attempted.
    None,
    /// Tier 1 succeeded; the deployment now runs this many replicas.
    ScaledOrchestrator(u32),
    /// Tier 2 succeeded; the node group's desired capacity is now this.
    ScaledInfra(u32),
    /// Over threshold, but a recent scale is still inside the cooldown.
    CoolingDown,
    /// Over threshold and neither tier could scale.
    ScaleFailed,
}

impl ScaleAction {
    /// Whether the load crossed the threshold this tick. Every such
    /// tick is reported to operators.
    pub fn escalated(self) -> bool {
        !matches!(self, ScaleAction::None)
    }
}

impl fmt::Display for ScaleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleAction::None => write!(f, "no action"),
            ScaleAction::ScaledOrchestrator(n) => write!(f, "scaled deployment to {n} replicas"),
            ScaleAction::ScaledInfra(n) => write!(f, "scaled node group to {n}"),
            ScaleAction::CoolingDown => write!(f, "scaling cooling down"),
            ScaleAction::ScaleFailed => write!(f, "scaling failed"),
        }
    }
}

// ── Alerts ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A notification for operators. Not deduplicated or stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub severity: Severity,
    pub message: String,
    /// Unix timestamp (seconds) when the event was raised.
    pub timestamp: u64,
}

impl AlertEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp: epoch_secs(),
        }
    }

    /// The alert raised on every over-threshold tick.
    pub fn high_load(sample: LoadSample, action: ScaleAction) -> Self {
        let severity = match action {
            ScaleAction::ScaleFailed => Severity::Critical,
            _ => Severity::Warning,
        };
        Self::new(
            severity,
            format!("🚨 High CPU detected: {sample} ({action})"),
        )
    }
}

pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_sample_rejects_invalid_readings() {
        assert!(LoadSample::new(f64::NAN).is_none());
        assert!(LoadSample::new(f64::INFINITY).is_none());
        assert!(LoadSample::new(-0.5).is_none());
        assert_eq!(LoadSample::new(0.85).map(LoadSample::value), Some(0.85));
    }

    #[test]
    fn threshold_comparison_is_strict() {
        let at = LoadSample::new(0.7).unwrap();
        assert!(!at.exceeds(0.7));
        assert!(LoadSample::new(0.71).unwrap().exceeds(0.7));
        assert!(!LoadSample::NO_DATA.exceeds(0.7));
    }

    #[test]
    fn selector_parses_and_matches() {
        let sel: LabelSelector = "app=backend".parse().unwrap();
        assert_eq!(sel, LabelSelector::new("app", "backend"));

        let pod = WorkloadInstance::new("p1", 0).with_label("app", "backend");
        assert!(sel.matches(&pod.labels));

        let other = WorkloadInstance::new("p2", 0).with_label("app", "frontend");
        assert!(!sel.matches(&other.labels));
        assert!(!sel.matches(&WorkloadInstance::new("p3", 0).labels));
    }

    #[test]
    fn selector_rejects_malformed_input() {
        assert!("app".parse::<LabelSelector>().is_err());
        assert!("=backend".parse::<LabelSelector>().is_err());
        assert!("app=".parse::<LabelSelector>().is_err());
    }

    #[test]
    fn only_none_is_not_escalated() {
        assert!(!ScaleAction::None.escalated());
        assert!(ScaleAction::ScaledOrchestrator(3).escalated());
        assert!(ScaleAction::ScaledInfra(4).escalated());
        assert!(ScaleAction::CoolingDown.escalated());
        assert!(ScaleAction::ScaleFailed.escalated());
    }

    #[test]
    fn high_load_alert_reports_outcome() {
        let sample = LoadSample::new(0.85).unwrap();

        let ok = AlertEvent::high_load(sample, ScaleAction::ScaledOrchestrator(3));
        assert_eq!(ok.severity, Severity::Warning);
        assert!(ok.message.contains("High CPU detected: 0.85"));
        assert!(ok.message.contains("scaled deployment to 3 replicas"));

        let failed = AlertEvent::high_load(sample, ScaleAction::ScaleFailed);
        assert_eq!(failed.severity, Severity::Critical);
        assert!(failed.message.contains("scaling failed"));

        let cooling = AlertEvent::high_load(sample, ScaleAction::CoolingDown);
        assert_eq!(cooling.severity, Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
