//! Per-tick telemetry push.
//!
//! Forwards each sampled value to the cloud metric sink so the load the
//! loop acted on can be graphed next to the capacity it produced.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use aiops_core::{LoadSample, MetricSink, MetricUnit, with_deadline};

/// Metric name the CPU reading is published under.
pub const CPU_METRIC_NAME: &str = "CPUUsage";

pub struct TelemetryPublisher {
    sink: Arc<dyn MetricSink>,
    namespace: String,
    call_timeout: Duration,
}

impl TelemetryPublisher {
    pub fn new(sink: Arc<dyn MetricSink>, namespace: &str, call_timeout: Duration) -> Self {
        Self {
            sink,
            namespace: namespace.to_string(),
            call_timeout,
        }
    }

    /// Push one datapoint. Failures are logged only; returns whether the
    /// push was accepted.
    pub async fn publish(&self, sample: LoadSample) -> bool {
        let result = with_deadline(
            "put metric",
            self.call_timeout,
            self.sink.put_metric(
                &self.namespace,
                CPU_METRIC_NAME,
                sample.value(),
                MetricUnit::Percent,
            ),
        )
        .await;

        match result {
            Ok(()) => {
                debug!(namespace = %self.namespace, %sample, "telemetry pushed");
                true
            }
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "telemetry push failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_core::testing::FakeMetricSink;

    #[tokio::test]
    async fn publishes_cpu_datapoint() {
        let sink = Arc::new(FakeMetricSink::new());
        let publisher =
            TelemetryPublisher::new(sink.clone(), "QuickChat/AIOps", Duration::from_secs(5));

        assert!(publisher.publish(LoadSample::new(0.42).unwrap()).await);
        assert_eq!(
            sink.datapoints(),
            vec![(
                "QuickChat/AIOps".to_string(),
                "CPUUsage".to_string(),
                0.42,
                MetricUnit::Percent
            )]
        );
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let sink = Arc::new(FakeMetricSink::new());
        sink.fail();
        let publisher = TelemetryPublisher::new(sink.clone(), "ns", Duration::from_secs(5));

        assert!(!publisher.publish(LoadSample::NO_DATA).await);
        assert!(sink.datapoints().is_empty());
    }
}
