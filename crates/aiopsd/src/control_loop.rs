//! ControlLoop — one sequential pass per tick over every stage.
//!
//! ```text
//! Idle → Sampling → Reconciling → Deciding → Notifying → Idle
//! ```
//!
//! Each stage runs behind a panic boundary. A stage that errors has
//! already degraded to its no-op result; a stage that panics is logged
//! and replaced by that same no-op result, and the tick carries on.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, info_span};

use aiops_alert::{AlertDispatcher, DispatchReport};
use aiops_autoscale::{EscalationPolicy, ScalingEscalator, ScalingTargets};
use aiops_core::{
    AiopsConfig, AlertChannel, AlertEvent, LoadSample, MetricSink, MetricsBackend, Orchestrator,
    ScaleAction, ScalingGroupApi,
};
use aiops_health::{HealthReconciler, RestartPolicy};
use aiops_metrics::{MetricSampler, TelemetryPublisher};

/// Where the loop currently is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    Idle,
    Sampling,
    Reconciling,
    Deciding,
    Notifying,
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TickStage::Idle => "idle",
            TickStage::Sampling => "sampling",
            TickStage::Reconciling => "reconciling",
            TickStage::Deciding => "deciding",
            TickStage::Notifying => "notifying",
        };
        f.write_str(s)
    }
}

/// What one tick observed and did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub sample: LoadSample,
    /// Pods deleted by the health pass.
    pub deleted: usize,
    pub action: ScaleAction,
    /// Present when an alert was raised.
    pub alert: Option<DispatchReport>,
    /// Stages that panicked.
    pub panicked: Vec<TickStage>,
}

/// The external backends the loop is driven through.
pub struct Collaborators {
    pub metrics: Arc<dyn MetricsBackend>,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub scaling_group: Arc<dyn ScalingGroupApi>,
    /// Telemetry sink; `None` disables the per-tick push.
    pub metric_sink: Option<Arc<dyn MetricSink>>,
    /// Configured alert channels only.
    pub channels: Vec<Arc<dyn AlertChannel>>,
}

pub struct ControlLoop {
    sampler: MetricSampler,
    telemetry: Option<TelemetryPublisher>,
    reconciler: HealthReconciler,
    escalator: ScalingEscalator,
    dispatcher: AlertDispatcher,
    interval: Duration,
    stage: TickStage,
    ticks: u64,
}

impl ControlLoop {
    pub fn new(config: &AiopsConfig, backends: Collaborators) -> Self {
        let timeout = config.call_timeout;

        let sampler = MetricSampler::new(backends.metrics, &config.namespace, timeout);
        let telemetry = backends
            .metric_sink
            .map(|sink| TelemetryPublisher::new(sink, &config.metric_namespace, timeout));

        let reconciler = HealthReconciler::new(
            backends.orchestrator.clone(),
            &config.namespace,
            RestartPolicy::new(config.workload_selector.clone(), config.restart_threshold),
            timeout,
        );

        let escalator = ScalingEscalator::new(
            backends.orchestrator,
            backends.scaling_group,
            ScalingTargets {
                deployment: config.deployment_name.clone(),
                namespace: config.namespace.clone(),
                group: config.asg_name.clone(),
            },
            EscalationPolicy {
                cpu_threshold: config.cpu_threshold,
                max_replicas: config.max_replicas,
                cooldown: config.scale_cooldown,
            },
            timeout,
        );

        let dispatcher = backends
            .channels
            .into_iter()
            .fold(AlertDispatcher::new(timeout), AlertDispatcher::with_channel);

        Self {
            sampler,
            telemetry,
            reconciler,
            escalator,
            dispatcher,
            interval: config.tick_interval,
            stage: TickStage::Idle,
            ticks: 0,
        }
    }

    pub fn stage(&self) -> TickStage {
        self.stage
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn escalator(&self) -> &ScalingEscalator {
        &self.escalator
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    /// Run a single tick through every stage.
    pub async fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let mut panicked = Vec::new();

        self.stage = TickStage::Sampling;
        let sample = guarded(self.stage, self.sampler.sample())
            .await
            .unwrap_or_else(|| {
                panicked.push(TickStage::Sampling);
                LoadSample::NO_DATA
            });

        // The reading survives a telemetry panic.
        if let Some(telemetry) = &self.telemetry {
            let pushed = guarded(self.stage, telemetry.publish(sample)).await;
            if pushed.is_none() && !panicked.contains(&TickStage::Sampling) {
                panicked.push(TickStage::Sampling);
            }
        }

        self.stage = TickStage::Reconciling;
        let deleted = guarded(self.stage, self.reconciler.reconcile())
            .await
            .unwrap_or_else(|| {
                panicked.push(TickStage::Reconciling);
                0
            });

        self.stage = TickStage::Deciding;
        let threshold = self.escalator.policy().cpu_threshold;
        let action = guarded(self.stage, self.escalator.decide(sample))
            .await
            .unwrap_or_else(|| {
                panicked.push(TickStage::Deciding);
                // Over threshold still has to reach operators.
                if sample.exceeds(threshold) {
                    ScaleAction::ScaleFailed
                } else {
                    ScaleAction::None
                }
            });

        let mut alert = None;
        if action.escalated() {
            self.stage = TickStage::Notifying;
            let event = AlertEvent::high_load(sample, action);
            alert = guarded(self.stage, self.dispatcher.dispatch(&event)).await;
            if alert.is_none() {
                panicked.push(TickStage::Notifying);
            }
        }

        self.stage = TickStage::Idle;

        let report = TickReport {
            tick: self.ticks,
            sample,
            deleted,
            action,
            alert,
            panicked,
        };
        info!(
            %sample,
            deleted,
            action = %action,
            alerted = report.alert.is_some(),
            "tick complete"
        );
        report
    }

    /// Tick every `interval` until `shutdown` flips or its sender is
    /// dropped. The first tick fires immediately. A tick in progress
    /// always completes before shutdown is observed.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            channels = ?self.dispatcher.channel_names(),
            "control loop started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let span = info_span!("tick", n = self.ticks + 1);
                    self.tick().instrument(span).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                        break;
                    }
                }
            }
        }

        info!(ticks = self.ticks, "control loop stopped");
    }
}

/// Run `fut`, turning a panic into `None`.
async fn guarded<T, F>(stage: TickStage, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(%stage, panic = %panic_message(payload.as_ref()), "stage panicked");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guarded_passes_values_through() {
        assert_eq!(guarded(TickStage::Sampling, async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn guarded_contains_panics() {
        let explode = true;
        let out = guarded(TickStage::Reconciling, async move {
            if explode {
                panic!("boom");
            }
            1u32
        })
        .await;
        assert_eq!(out, None);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(format!("owned {}", 1));
        assert_eq!(panic_message(payload.as_ref()), "owned 1");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
