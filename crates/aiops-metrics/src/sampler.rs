//! MetricSampler — one aggregate CPU reading per tick.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use aiops_core::{BackendError, LoadSample, MetricsBackend, with_deadline};

/// Why a tick produced no usable reading.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SampleError {
    /// The query succeeded but matched no series.
    #[error("query returned no series")]
    NoData,

    /// The backend answered with a non-"success" status.
    #[error("query status was {0:?}")]
    Rejected(String),

    /// The reading was NaN, infinite, or negative.
    #[error("invalid reading {0}")]
    InvalidReading(f64),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct MetricSampler {
    backend: Arc<dyn MetricsBackend>,
    query: String,
    call_timeout: Duration,
}

impl MetricSampler {
    /// Sample the aggregate CPU rate of every container in `namespace`.
    pub fn new(backend: Arc<dyn MetricsBackend>, namespace: &str, call_timeout: Duration) -> Self {
        Self {
            backend,
            query: cpu_query(namespace),
            call_timeout,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Take one reading, reporting why it failed.
    pub async fn try_sample(&self) -> Result<LoadSample, SampleError> {
        let resp = with_deadline(
            "metrics query",
            self.call_timeout,
            self.backend.query(&self.query),
        )
        .await?;

        if !resp.is_success() {
            return Err(SampleError::Rejected(resp.status));
        }

        let first = resp.series.first().ok_or(SampleError::NoData)?;
        LoadSample::new(first.value).ok_or(SampleError::InvalidReading(first.value))
    }

    /// Take one reading. Never fails: any problem is logged and reported
    /// as [`LoadSample::NO_DATA`].
    pub async fn sample(&self) -> LoadSample {
        match self.try_sample().await {
            Ok(sample) => {
                debug!(%sample, "cpu sampled");
                sample
            }
            Err(SampleError::NoData) => {
                info!(query = %self.query, "metrics query matched no series");
                LoadSample::NO_DATA
            }
            Err(e) => {
                warn!(error = %e, "metrics query failed, treating as no load");
                LoadSample::NO_DATA
            }
        }
    }
}

/// Aggregate CPU consumption rate over the trailing minute.
pub fn cpu_query(namespace: &str) -> String {
    format!("sum(rate(container_cpu_usage_seconds_total{{namespace=\"{namespace}\"}}[1m]))")
}
