//! The slices of Kubernetes API objects the client reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use aiops_core::WorkloadInstance;

#[derive(Debug, Deserialize)]
pub(crate) struct Deployment {
    #[serde(default)]
    pub spec: DeploymentSpec,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeploymentSpec {
    /// The API server defaults an unset count to 1.
    pub replicas: Option<u32>,
}

impl Deployment {
    pub fn replicas(&self) -> u32 {
        self.spec.replicas.unwrap_or(1)
    }
}

/// `{"spec": {"replicas": n}}`
#[derive(Debug, Serialize)]
pub(crate) struct ScalePatch {
    pub spec: ScalePatchSpec,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScalePatchSpec {
    pub replicas: u32,
}

impl ScalePatch {
    pub fn replicas(replicas: u32) -> Self {
        Self {
            spec: ScalePatchSpec { replicas },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PodStatus {
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContainerStatus {
    #[serde(default)]
    pub restart_count: u32,
}

impl From<Pod> for WorkloadInstance {
    fn from(pod: Pod) -> Self {
        let restart_count = pod
            .status
            .container_statuses
            .iter()
            .map(|c| c.restart_count)
            .max()
            .unwrap_or(0);

        WorkloadInstance {
            id: pod.metadata.name,
            labels: pod.metadata.labels,
            restart_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_restart_count_is_worst_container() {
        let pod: Pod = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "backend-7d9f", "labels": {"app": "backend"}},
            "status": {"containerStatuses": [
                {"name": "app", "restartCount": 1},
                {"name": "sidecar", "restartCount": 6}
            ]}
        }))
        .unwrap();

        let inst = WorkloadInstance::from(pod);
        assert_eq!(inst.id, "backend-7d9f");
        assert_eq!(inst.labels.get("app").map(String::as_str), Some("backend"));
        assert_eq!(inst.restart_count, 6);
    }

    #[test]
    fn pending_pod_without_status_has_no_restarts() {
        let pod: Pod = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "backend-new"}
        }))
        .unwrap();

        let inst = WorkloadInstance::from(pod);
        assert_eq!(inst.restart_count, 0);
        assert!(inst.labels.is_empty());
    }

    #[test]
    fn scale_patch_shape() {
        assert_eq!(
            serde_json::to_value(ScalePatch::replicas(4)).unwrap(),
            serde_json::json!({"spec": {"replicas": 4}})
        );
    }
}
