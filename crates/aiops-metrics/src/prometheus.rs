//! Prometheus HTTP query client.
//!
//! Speaks the instant-query endpoint (`GET /api/v1/query`) and decodes
//! vector and scalar results into a [`QueryResponse`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use aiops_core::{BackendError, BackendResult, MetricsBackend, QueryResponse, Series};

#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl PrometheusClient {
    /// Create a client for `base_url` (e.g. `http://prometheus-server:9090`).
    pub fn new(base_url: &str, timeout: Duration) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aiops/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_err(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                call: "prometheus query",
                after: self.timeout,
            }
        } else if e.is_decode() {
            BackendError::Malformed(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl MetricsBackend for PrometheusClient {
    async fn query(&self, expr: &str) -> BackendResult<QueryResponse> {
        let url = format!("{}/api/v1/query", self.base_url);
        debug!(%url, %expr, "querying prometheus");

        let resp = self
            .http
            .get(&url)
            .query(&[("query", expr)])
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::status(status.as_u16(), body));
        }

        let api: ApiResponse = resp.json().await.map_err(|e| self.map_err(e))?;
        api.into_query_response()
    }
}

// ── Wire format ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    /// `[unix_ts, "value"]`
    value: (f64, String),
}

impl ApiResponse {
    fn into_query_response(self) -> BackendResult<QueryResponse> {
        let series = match self.data {
            None => Vec::new(),
            Some(data) => match data.result_type.as_str() {
                "vector" => {
                    let samples: Vec<VectorSample> = serde_json::from_value(data.result)
                        .map_err(|e| BackendError::Malformed(format!("vector result: {e}")))?;
                    samples
                        .into_iter()
                        .map(|s| {
                            Ok(Series {
                                labels: s.metric,
                                value: parse_value(&s.value.1)?,
                            })
                        })
                        .collect::<BackendResult<Vec<_>>>()?
                }
                "scalar" => {
                    let (_, raw): (f64, String) = serde_json::from_value(data.result)
                        .map_err(|e| BackendError::Malformed(format!("scalar result: {e}")))?;
                    vec![Series {
                        labels: BTreeMap::new(),
                        value: parse_value(&raw)?,
                    }]
                }
                other => {
                    return Err(BackendError::Malformed(format!(
                        "unsupported result type {other:?}"
                    )));
                }
            },
        };

        Ok(QueryResponse {
            status: self.status,
            series,
        })
    }
}

fn parse_value(raw: &str) -> BackendResult<f64> {
    raw.parse::<f64>()
        .map_err(|_| BackendError::Malformed(format!("sample value {raw:?} is not a number")))
}
