//! ScalingEscalator — decides and applies one scale step per tick.
//!
//! Holds the only mutable decision state in the process. State is
//! updated only after a backend confirmed a scale action, and all access
//! goes through `&mut self`, so writes are serialized by ownership.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use aiops_core::{
    BackendError, BackendResult, LoadSample, Orchestrator, ScaleAction, ScalingGroupApi,
    with_deadline,
};

/// Thresholds and limits for escalation.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationPolicy {
    /// Raw aggregate CPU rate above which the loop escalates.
    pub cpu_threshold: f64,
    /// Tier 1 never scales the deployment beyond this.
    pub max_replicas: u32,
    /// Minimum gap between successful scale actions. Zero disables it.
    pub cooldown: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            cpu_threshold: 0.7,
            max_replicas: 5,
            cooldown: Duration::ZERO,
        }
    }
}

/// What gets scaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingTargets {
    pub deployment: String,
    pub namespace: String,
    /// Cloud autoscaling group grown by tier 2.
    pub group: String,
}

/// Last confirmed view of both scaling domains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalingState {
    /// Deployment replicas after the last confirmed tier-1 scale. Never
    /// above `max_replicas`.
    pub orchestrator_replicas: Option<u32>,
    /// Group desired capacity, once written.
    pub infra_desired_capacity: Option<u32>,
    /// When the last successful scale action happened.
    pub last_scale_at: Option<Instant>,
}

/// Result of a tier-1 attempt that did not error.
enum OrchestratorStep {
    Scaled(u32),
    Saturated(u32),
}

pub struct ScalingEscalator {
    orchestrator: Arc<dyn Orchestrator>,
    group: Arc<dyn ScalingGroupApi>,
    targets: ScalingTargets,
    policy: EscalationPolicy,
    call_timeout: Duration,
    state: ScalingState,
}

impl ScalingEscalator {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        group: Arc<dyn ScalingGroupApi>,
        targets: ScalingTargets,
        policy: EscalationPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            group,
            targets,
            policy,
            call_timeout,
            state: ScalingState::default(),
        }
    }

    pub fn state(&self) -> &ScalingState {
        &self.state
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Decide on this tick's sample and apply at most one scale step.
    ///
    /// Never fails: backend errors are logged and end in
    /// [`ScaleAction::ScaleFailed`].
    pub async fn decide(&mut self, sample: LoadSample) -> ScaleAction {
        if !sample.exceeds(self.policy.cpu_threshold) {
            debug!(
                %sample,
                threshold = self.policy.cpu_threshold,
                "load within threshold"
            );
            return ScaleAction::None;
        }

        info!(
            %sample,
            threshold = self.policy.cpu_threshold,
            "load above threshold, escalating"
        );

        if self.cooling_down() {
            info!(cooldown_secs = self.policy.cooldown.as_secs(), "scale cooldown active");
            return ScaleAction::CoolingDown;
        }

        match self.scale_orchestrator().await {
            Ok(OrchestratorStep::Scaled(replicas)) => {
                self.state.orchestrator_replicas = Some(replicas);
                self.state.last_scale_at = Some(Instant::now());
                info!(
                    deployment = %self.targets.deployment,
                    replicas,
                    "deployment scaled"
                );
                return ScaleAction::ScaledOrchestrator(replicas);
            }
            Ok(OrchestratorStep::Saturated(replicas)) => {
                info!(
                    deployment = %self.targets.deployment,
                    replicas,
                    max = self.policy.max_replicas,
                    "max replicas reached, falling back to node group"
                );
            }
            Err(e) => {
                warn!(
                    deployment = %self.targets.deployment,
                    error = %e,
                    "deployment scaling failed, falling back to node group"
                );
            }
        }

        match self.scale_infra().await {
            Ok(capacity) => {
                self.state.infra_desired_capacity = Some(capacity);
                self.state.last_scale_at = Some(Instant::now());
                info!(group = %self.targets.group, capacity, "node group scaled");
                ScaleAction::ScaledInfra(capacity)
            }
            Err(e) => {
                warn!(group = %self.targets.group, error = %e, "node group scaling failed");
                ScaleAction::ScaleFailed
            }
        }
    }

    fn cooling_down(&self) -> bool {
        if self.policy.cooldown.is_zero() {
            return false;
        }
        self.state
            .last_scale_at
            .is_some_and(|at| at.elapsed() < self.policy.cooldown)
    }

    /// Tier 1: add one replica to the deployment if below the maximum.
    async fn scale_orchestrator(&mut self) -> BackendResult<OrchestratorStep> {
        let ScalingTargets {
            deployment,
            namespace,
            ..
        } = &self.targets;

        let current = with_deadline(
            "read deployment",
            self.call_timeout,
            self.orchestrator.deployment_replicas(deployment, namespace),
        )
        .await?;

        if current > self.policy.max_replicas {
            warn!(
                %deployment,
                replicas = current,
                max = self.policy.max_replicas,
                "deployment runs more replicas than the configured maximum"
            );
            return Ok(OrchestratorStep::Saturated(current));
        }

        if current == self.policy.max_replicas {
            return Ok(OrchestratorStep::Saturated(current));
        }

        let target = current + 1;
        let confirmed = with_deadline(
            "patch deployment",
            self.call_timeout,
            self.orchestrator
                .patch_deployment_replicas(deployment, namespace, target),
        )
        .await?;

        if confirmed != target {
            return Err(BackendError::Rejected(format!(
                "patched {deployment} to {target} replicas but it reports {confirmed}"
            )));
        }
        Ok(OrchestratorStep::Scaled(target))
    }

    /// Tier 2: add one instance to the cloud autoscaling group,
    /// overriding the group's own cooldown.
    async fn scale_infra(&self) -> BackendResult<u32> {
        let group = &self.targets.group;

        let current = with_deadline(
            "describe scaling group",
            self.call_timeout,
            self.group.desired_capacity(group),
        )
        .await?;

        let target = current
            .checked_add(1)
            .ok_or_else(|| BackendError::Rejected(format!("{group} capacity overflow")))?;

        with_deadline(
            "set desired capacity",
            self.call_timeout,
            self.group.set_desired_capacity(group, target, false),
        )
        .await?;

        Ok(target)
    }
}
