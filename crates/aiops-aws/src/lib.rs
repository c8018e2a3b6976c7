//! aiops-aws — AWS implementations of the cloud-side collaborators.
//!
//! ```text
//! AwsClients::load(region)
//!   ├── AutoScalingGroups  ScalingGroupApi  (tier-2 capacity)
//!   ├── CloudWatchSink     MetricSink       (per-tick telemetry)
//!   └── SnsChannel         AlertChannel     (pub/sub alerts)
//! ```
//!
//! Credentials come from the default provider chain (environment,
//! profile, web identity, instance metadata).

mod error;

pub mod autoscaling;
pub mod cloudwatch;
pub mod sns;

pub use autoscaling::AutoScalingGroups;
pub use cloudwatch::CloudWatchSink;
pub use sns::SnsChannel;

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Shared SDK configuration for one region.
#[derive(Debug, Clone)]
pub struct AwsClients {
    config: SdkConfig,
}

impl AwsClients {
    pub async fn load(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        tracing::debug!(%region, "loaded aws sdk config");
        Self { config }
    }

    pub fn autoscaling(&self) -> AutoScalingGroups {
        AutoScalingGroups::new(aws_sdk_autoscaling::Client::new(&self.config))
    }

    pub fn cloudwatch(&self) -> CloudWatchSink {
        CloudWatchSink::new(aws_sdk_cloudwatch::Client::new(&self.config))
    }

    pub fn sns(&self, topic_arn: &str, subject: &str) -> SnsChannel {
        SnsChannel::new(aws_sdk_sns::Client::new(&self.config), topic_arn, subject)
    }
}
