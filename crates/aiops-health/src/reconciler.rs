//! HealthReconciler — one repair pass per tick.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use aiops_core::{BackendResult, Orchestrator, with_deadline};

use crate::policy::RestartPolicy;

/// What a single pass saw and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Pods listed in the namespace.
    pub examined: usize,
    /// Pods selected for replacement.
    pub matched: usize,
    /// Deletions the orchestrator accepted.
    pub deleted: usize,
    /// Deletions that failed.
    pub failed: usize,
}

pub struct HealthReconciler {
    orchestrator: Arc<dyn Orchestrator>,
    namespace: String,
    policy: RestartPolicy,
    call_timeout: Duration,
}

impl HealthReconciler {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        namespace: &str,
        policy: RestartPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            namespace: namespace.to_string(),
            policy,
            call_timeout,
        }
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    /// Run one pass. Fails only if the pod list cannot be fetched; a
    /// failed delete is counted and the pass moves on to the next pod.
    pub async fn try_reconcile(&self) -> BackendResult<ReconcileReport> {
        let pods = with_deadline(
            "list pods",
            self.call_timeout,
            self.orchestrator.list_pods(&self.namespace),
        )
        .await?;

        let mut report = ReconcileReport {
            examined: pods.len(),
            ..Default::default()
        };

        for pod in pods.iter().filter(|p| self.policy.needs_replacement(p)) {
            report.matched += 1;
            info!(
                pod = %pod.id,
                restarts = pod.restart_count,
                threshold = self.policy.threshold,
                "restarting pod"
            );

            let deleted = with_deadline(
                "delete pod",
                self.call_timeout,
                self.orchestrator.delete_pod(&pod.id, &self.namespace),
            )
            .await;

            match deleted {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(pod = %pod.id, error = %e, "pod restart failed");
                }
            }
        }

        debug!(
            namespace = %self.namespace,
            examined = report.examined,
            deleted = report.deleted,
            "reconcile pass complete"
        );
        Ok(report)
    }

    /// Run one pass and return the number of pods repaired. Never fails.
    pub async fn reconcile(&self) -> usize {
        match self.try_reconcile().await {
            Ok(report) => report.deleted,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "pod listing failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_core::WorkloadInstance;
    use aiops_core::testing::FakeOrchestrator;

    fn backend(id: &str, restarts: u32) -> WorkloadInstance {
        WorkloadInstance::new(id, restarts).with_label("app", "backend")
    }

    fn reconciler(orch: Arc<FakeOrchestrator>) -> HealthReconciler {
        HealthReconciler::new(
            orch,
            "default",
            RestartPolicy::default(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn healthy_pods_are_left_alone() {
        let orch = Arc::new(
            FakeOrchestrator::new(2).with_pods(vec![backend("b-0", 0), backend("b-1", 3)]),
        );
        let r = reconciler(orch.clone());

        assert_eq!(r.reconcile().await, 0);
        assert_eq!(r.reconcile().await, 0);
        assert!(orch.deletions().is_empty());
    }

    #[tokio::test]
    async fn crash_looping_pod_is_deleted_once_per_pass() {
        let orch = Arc::new(FakeOrchestrator::new(2).with_pods(vec![
            backend("b-0", 1),
            backend("b-1", 4),
            WorkloadInstance::new("f-0", 9).with_label("app", "frontend"),
        ]));
        let r = reconciler(orch.clone());

        let report = r.try_reconcile().await.unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                examined: 3,
                matched: 1,
                deleted: 1,
                failed: 0
            }
        );
        assert_eq!(orch.deletions(), vec!["b-1".to_string()]);
    }

    #[tokio::test]
    async fn failed_delete_does_not_stop_the_pass() {
        let orch = Arc::new(
            FakeOrchestrator::new(2).with_pods(vec![backend("b-0", 5), backend("b-1", 7)]),
        );
        orch.fail_delete("b-0");
        let r = reconciler(orch.clone());

        let report = r.try_reconcile().await.unwrap();
        assert_eq!(report.matched, 2);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(orch.deletions(), vec!["b-1".to_string()]);
    }

    #[tokio::test]
    async fn list_failure_repairs_nothing() {
        let orch = Arc::new(FakeOrchestrator::new(2).with_pods(vec![backend("b-0", 9)]));
        orch.fail_list();
        let r = reconciler(orch.clone());

        assert!(r.try_reconcile().await.is_err());
        assert_eq!(r.reconcile().await, 0);
        assert!(orch.deletions().is_empty());
    }

    #[tokio::test]
    async fn custom_selector_and_threshold() {
        let orch = Arc::new(FakeOrchestrator::new(1).with_pods(vec![
            WorkloadInstance::new("w-0", 2).with_label("tier", "worker"),
            backend("b-0", 2),
        ]));
        let r = HealthReconciler::new(
            orch.clone(),
            "jobs",
            RestartPolicy::new(aiops_core::LabelSelector::new("tier", "worker"), 1),
            Duration::from_secs(5),
        );

        assert_eq!(r.reconcile().await, 1);
        assert_eq!(orch.deletions(), vec!["w-0".to_string()]);
    }
}
