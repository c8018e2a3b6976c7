//! EC2 Auto Scaling group capacity.

use async_trait::async_trait;
use aws_sdk_autoscaling::Client;
use tracing::debug;

use aiops_core::{BackendError, BackendResult, ScalingGroupApi};

use crate::error::sdk_error;

#[derive(Debug, Clone)]
pub struct AutoScalingGroups {
    client: Client,
}

impl AutoScalingGroups {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScalingGroupApi for AutoScalingGroups {
    async fn desired_capacity(&self, group: &str) -> BackendResult<u32> {
        let out = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(group)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeAutoScalingGroups", e))?;

        // Filtered by name, so at most one group comes back.
        let asg = out
            .auto_scaling_groups()
            .first()
            .ok_or_else(|| BackendError::NotFound(format!("auto scaling group {group}")))?;

        capacity_from_sdk(asg.desired_capacity())
    }

    async fn set_desired_capacity(
        &self,
        group: &str,
        capacity: u32,
        honor_cooldown: bool,
    ) -> BackendResult<()> {
        self.client
            .set_desired_capacity()
            .auto_scaling_group_name(group)
            .desired_capacity(capacity_to_sdk(capacity)?)
            .honor_cooldown(honor_cooldown)
            .send()
            .await
            .map_err(|e| sdk_error("SetDesiredCapacity", e))?;

        debug!(%group, capacity, honor_cooldown, "desired capacity set");
        Ok(())
    }
}

fn capacity_from_sdk(value: Option<i32>) -> BackendResult<u32> {
    let value =
        value.ok_or_else(|| BackendError::Malformed("group has no desired capacity".into()))?;
    u32::try_from(value)
        .map_err(|_| BackendError::Malformed(format!("negative desired capacity {value}")))
}

fn capacity_to_sdk(capacity: u32) -> BackendResult<i32> {
    i32::try_from(capacity)
        .map_err(|_| BackendError::Rejected(format!("capacity {capacity} out of range")))
}
