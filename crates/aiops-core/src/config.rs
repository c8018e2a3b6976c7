//! Process configuration.
//!
//! Loaded once at startup and immutable afterwards. Layers, lowest to
//! highest precedence:
//!
//! 1. built-in defaults ([`AiopsConfig::default`])
//! 2. an optional TOML file
//! 3. environment variables (`PROMETHEUS_URL`, `CPU_THRESHOLD`, ...)
//!
//! Any layer failing to parse, or the merged result failing
//! [`AiopsConfig::validate`], is a fatal startup error.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::types::LabelSelector;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiopsConfig {
    /// Base URL of the Prometheus-compatible query API.
    pub prometheus_url: String,
    /// Aggregate CPU rate above which the loop escalates.
    pub cpu_threshold: f64,
    /// Upper bound for the deployment's replica count (tier 1).
    pub max_replicas: u32,
    pub deployment_name: String,
    pub namespace: String,
    /// Auto Scaling group grown when tier 1 is saturated.
    pub asg_name: String,
    pub aws_region: String,
    pub slack_webhook: Option<String>,
    pub sns_topic_arn: Option<String>,
    pub sns_subject: String,
    /// Which pods the health reconciler considers.
    pub workload_selector: LabelSelector,
    /// Pods restarted more than this many times are deleted.
    pub restart_threshold: u32,
    #[serde(deserialize_with = "de_duration")]
    pub tick_interval: Duration,
    /// Deadline applied to every external call.
    #[serde(deserialize_with = "de_duration")]
    pub call_timeout: Duration,
    /// Minimum gap between successful scale actions. Zero disables it.
    #[serde(deserialize_with = "de_duration")]
    pub scale_cooldown: Duration,
    /// CloudWatch namespace for the per-tick CPU datapoint.
    pub metric_namespace: String,
    pub push_metrics: bool,
}

impl Default for AiopsConfig {
    fn default() -> Self {
        Self {
            prometheus_url: "http://prometheus-server:9090".to_string(),
            cpu_threshold: 0.7,
            max_replicas: 5,
            deployment_name: "quickchat-backend".to_string(),
            namespace: "default".to_string(),
            asg_name: "quickchat-worker-asg".to_string(),
            aws_region: "ap-south-1".to_string(),
            slack_webhook: None,
            sns_topic_arn: None,
            sns_subject: "QuickChat AIOps Alert".to_string(),
            workload_selector: LabelSelector::new("app", "backend"),
            restart_threshold: 3,
            tick_interval: Duration::from_secs(60),
            call_timeout: Duration::from_secs(5),
            scale_cooldown: Duration::ZERO,
            metric_namespace: "QuickChat/AIOps".to_string(),
            push_metrics: true,
        }
    }
}

impl AiopsConfig {
    /// Load defaults, then `path` if given, then the process environment,
    /// and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override fields from environment variables. `lookup` is
    /// `std::env::var` in production; empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PROMETHEUS_URL") {
            self.prometheus_url = v;
        }
        if let Some(v) = parsed(&get, "CPU_THRESHOLD")? {
            self.cpu_threshold = v;
        }
        if let Some(v) = parsed(&get, "MAX_REPLICAS")? {
            self.max_replicas = v;
        }
        if let Some(v) = get("DEPLOYMENT_NAME") {
            self.deployment_name = v;
        }
        if let Some(v) = get("NAMESPACE") {
            self.namespace = v;
        }
        if let Some(v) = get("ASG_NAME") {
            self.asg_name = v;
        }
        if let Some(v) = get("AWS_REGION") {
            self.aws_region = v;
        }
        if let Some(v) = get("SLACK_WEBHOOK") {
            self.slack_webhook = Some(v);
        }
        if let Some(v) = get("SNS_TOPIC_ARN") {
            self.sns_topic_arn = Some(v);
        }
        if let Some(v) = get("SNS_SUBJECT") {
            self.sns_subject = v;
        }
        if let Some(v) = parsed(&get, "WORKLOAD_SELECTOR")? {
            self.workload_selector = v;
        }
        if let Some(v) = parsed(&get, "RESTART_THRESHOLD")? {
            self.restart_threshold = v;
        }
        if let Some(v) = duration(&get, "TICK_INTERVAL")? {
            self.tick_interval = v;
        }
        if let Some(v) = duration(&get, "CALL_TIMEOUT")? {
            self.call_timeout = v;
        }
        if let Some(v) = duration(&get, "SCALE_COOLDOWN")? {
            self.scale_cooldown = v;
        }
        if let Some(v) = get("METRIC_NAMESPACE") {
            self.metric_namespace = v;
        }
        if let Some(v) = get("PUSH_METRICS") {
            self.push_metrics =
                parse_bool(&v).ok_or_else(|| ConfigError::invalid("PUSH_METRICS", v))?;
        }
        Ok(())
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cpu_threshold.is_finite() || self.cpu_threshold < 0.0 {
            return Err(ConfigError::invalid(
                "cpu_threshold",
                format!("{} is not a finite non-negative number", self.cpu_threshold),
            ));
        }
        if !(self.prometheus_url.starts_with("http://")
            || self.prometheus_url.starts_with("https://"))
        {
            return Err(ConfigError::invalid(
                "prometheus_url",
                format!("{:?} must start with http:// or https://", self.prometheus_url),
            ));
        }
        for (key, value) in [
            ("deployment_name", &self.deployment_name),
            ("namespace", &self.namespace),
            ("asg_name", &self.asg_name),
            ("aws_region", &self.aws_region),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(key, "must not be empty"));
            }
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::invalid("tick_interval", "must be greater than zero"));
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::invalid("call_timeout", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Parse a duration string like "500ms", "5s", "2m". A bare number is
/// seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parsed<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(key, format!("{v:?}: {e}")))
        })
        .transpose()
}

fn duration<G>(get: &G, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|v| {
            parse_duration(&v)
                .ok_or_else(|| ConfigError::invalid(key, format!("{v:?} is not a duration")))
        })
        .transpose()
}

fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("{raw:?} is not a duration")))
}
