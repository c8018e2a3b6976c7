//! CloudWatch custom metrics.

use async_trait::async_trait;
use aws_sdk_cloudwatch::Client;
use aws_sdk_cloudwatch::types::{MetricDatum, StandardUnit};

use aiops_core::{BackendResult, MetricSink, MetricUnit};

use crate::error::sdk_error;

#[derive(Debug, Clone)]
pub struct CloudWatchSink {
    client: Client,
}

impl CloudWatchSink {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricSink for CloudWatchSink {
    async fn put_metric(
        &self,
        namespace: &str,
        name: &str,
        value: f64,
        unit: MetricUnit,
    ) -> BackendResult<()> {
        let datum = MetricDatum::builder()
            .metric_name(name)
            .value(value)
            .unit(standard_unit(unit))
            .build();

        self.client
            .put_metric_data()
            .namespace(namespace)
            .metric_data(datum)
            .send()
            .await
            .map_err(|e| sdk_error("PutMetricData", e))?;
        Ok(())
    }
}

fn standard_unit(unit: MetricUnit) -> StandardUnit {
    match unit {
        MetricUnit::Percent => StandardUnit::Percent,
        MetricUnit::Count => StandardUnit::Count,
        MetricUnit::None => StandardUnit::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_map_to_cloudwatch_names() {
        assert_eq!(standard_unit(MetricUnit::Percent).as_str(), "Percent");
        assert_eq!(standard_unit(MetricUnit::Count).as_str(), "Count");
        assert_eq!(standard_unit(MetricUnit::None).as_str(), "None");
    }
}
