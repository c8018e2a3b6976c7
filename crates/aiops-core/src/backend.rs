//! Collaborator contracts.
//!
//! The control loop depends only on these operations. Production
//! adapters live in `aiops-metrics` (Prometheus), `aiops-kube`
//! (Kubernetes), `aiops-aws` (Auto Scaling, CloudWatch, SNS) and
//! `aiops-alert` (chat webhook).

use async_trait::async_trait;

use crate::error::BackendResult;
use crate::types::{AlertEvent, MetricUnit, QueryResponse, WorkloadInstance};

/// Time-series query backend.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Run an instant query.
    async fn query(&self, expr: &str) -> BackendResult<QueryResponse>;
}

/// Container orchestration control plane.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Current desired replica count of a deployment.
    async fn deployment_replicas(&self, name: &str, namespace: &str) -> BackendResult<u32>;

    /// Set the replica count. Returns the count reported by the updated
    /// object so the caller can confirm the write.
    async fn patch_deployment_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: u32,
    ) -> BackendResult<u32>;

    async fn list_pods(&self, namespace: &str) -> BackendResult<Vec<WorkloadInstance>>;

    /// Delete a pod; the orchestrator's own supervision recreates it.
    async fn delete_pod(&self, id: &str, namespace: &str) -> BackendResult<()>;
}

/// Cloud provider's virtual-machine scaling group.
#[async_trait]
pub trait ScalingGroupApi: Send + Sync {
    /// Desired capacity of the group. `NotFound` if it does not exist.
    async fn desired_capacity(&self, group: &str) -> BackendResult<u32>;

    async fn set_desired_capacity(
        &self,
        group: &str,
        capacity: u32,
        honor_cooldown: bool,
    ) -> BackendResult<()>;
}

/// Fire-and-forget telemetry destination.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn put_metric(
        &self,
        namespace: &str,
        name: &str,
        value: f64,
        unit: MetricUnit,
    ) -> BackendResult<()>;
}

/// One notification destination.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Short name used in logs ("slack", "sns").
    fn name(&self) -> &str;

    async fn send(&self, event: &AlertEvent) -> BackendResult<()>;
}
