//! In-memory fakes for every collaborator trait.
//!
//! Each fake records the calls it receives and can be told to fail, hang
//! or panic, so tests can drive the stages through their failure paths.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{AlertChannel, MetricSink, MetricsBackend, Orchestrator, ScalingGroupApi};
use crate::error::{BackendError, BackendResult};
use crate::types::{AlertEvent, MetricUnit, QueryResponse, Series, WorkloadInstance};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unavailable() -> BackendError {
    BackendError::Transport("connection refused".to_string())
}

// ── Metrics backend ────────────────────────────────────────────────

pub struct FakeMetricsBackend {
    response: Mutex<BackendResult<QueryResponse>>,
    delay: Mutex<Option<Duration>>,
    queries: Mutex<Vec<String>>,
}

impl FakeMetricsBackend {
    /// A backend answering every query with one successful series.
    pub fn returning(value: f64) -> Self {
        Self::with_response(Ok(QueryResponse {
            status: "success".to_string(),
            series: vec![Series {
                labels: Default::default(),
                value,
            }],
        }))
    }

    /// A backend whose every query fails with a transport error.
    pub fn unreachable() -> Self {
        Self::with_response(Err(unavailable()))
    }

    pub fn with_response(response: BackendResult<QueryResponse>) -> Self {
        Self {
            response: Mutex::new(response),
            delay: Mutex::new(None),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn set_response(&self, response: BackendResult<QueryResponse>) {
        *lock(&self.response) = response;
    }

    /// Sleep this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl MetricsBackend for FakeMetricsBackend {
    async fn query(&self, expr: &str) -> BackendResult<QueryResponse> {
        lock(&self.queries).push(expr.to_string());
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.response).clone()
    }
}

// ── Orchestrator ───────────────────────────────────────────────────

#[derive(Default)]
struct OrchestratorFaults {
    read: bool,
    patch: bool,
    unconfirmed_patch: bool,
    list: bool,
    panic_on_list: bool,
    delete: HashSet<String>,
}

/// A single deployment plus a pod list.
pub struct FakeOrchestrator {
    replicas: Mutex<u32>,
    pods: Mutex<Vec<WorkloadInstance>>,
    faults: Mutex<OrchestratorFaults>,
    patches: Mutex<Vec<u32>>,
    deletions: Mutex<Vec<String>>,
}

impl FakeOrchestrator {
    pub fn new(replicas: u32) -> Self {
        Self {
            replicas: Mutex::new(replicas),
            pods: Mutex::new(Vec::new()),
            faults: Mutex::new(OrchestratorFaults::default()),
            patches: Mutex::new(Vec::new()),
            deletions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pods(self, pods: Vec<WorkloadInstance>) -> Self {
        *lock(&self.pods) = pods;
        self
    }

    pub fn replicas(&self) -> u32 {
        *lock(&self.replicas)
    }

    /// Replica counts written through `patch_deployment_replicas`.
    pub fn patches(&self) -> Vec<u32> {
        lock(&self.patches).clone()
    }

    /// Pod ids deleted, in order.
    pub fn deletions(&self) -> Vec<String> {
        lock(&self.deletions).clone()
    }

    pub fn fail_reads(&self) {
        lock(&self.faults).read = true;
    }

    pub fn fail_patches(&self) {
        lock(&self.faults).patch = true;
    }

    /// Accept patches but report the old replica count back.
    pub fn ignore_patches(&self) {
        lock(&self.faults).unconfirmed_patch = true;
    }

    pub fn fail_list(&self) {
        lock(&self.faults).list = true;
    }

    pub fn panic_on_list(&self) {
        lock(&self.faults).panic_on_list = true;
    }

    pub fn fail_delete(&self, id: &str) {
        lock(&self.faults).delete.insert(id.to_string());
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn deployment_replicas(&self, _name: &str, _namespace: &str) -> BackendResult<u32> {
        if lock(&self.faults).read {
            return Err(unavailable());
        }
        Ok(*lock(&self.replicas))
    }

    async fn patch_deployment_replicas(
        &self,
        _name: &str,
        _namespace: &str,
        replicas: u32,
    ) -> BackendResult<u32> {
        let (fail, unconfirmed) = {
            let faults = lock(&self.faults);
            (faults.patch, faults.unconfirmed_patch)
        };
        if fail {
            return Err(BackendError::Status {
                code: 500,
                body: "internal error".to_string(),
            });
        }
        lock(&self.patches).push(replicas);
        let mut current = lock(&self.replicas);
        if !unconfirmed {
            *current = replicas;
        }
        Ok(*current)
    }

    async fn list_pods(&self, _namespace: &str) -> BackendResult<Vec<WorkloadInstance>> {
        let (fail, panic) = {
            let faults = lock(&self.faults);
            (faults.list, faults.panic_on_list)
        };
        if panic {
            panic!("pod listing blew up");
        }
        if fail {
            return Err(unavailable());
        }
        Ok(lock(&self.pods).clone())
    }

    async fn delete_pod(&self, id: &str, _namespace: &str) -> BackendResult<()> {
        if lock(&self.faults).delete.contains(id) {
            return Err(unavailable());
        }
        lock(&self.deletions).push(id.to_string());
        lock(&self.pods).retain(|p| p.id != id);
        Ok(())
    }
}

// ── Scaling group ──────────────────────────────────────────────────

pub struct FakeScalingGroup {
    /// `None` means the group does not exist.
    capacity: Mutex<Option<u32>>,
    fail_writes: Mutex<bool>,
    writes: Mutex<Vec<(u32, bool)>>,
}

impl FakeScalingGroup {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity: Mutex::new(Some(capacity)),
            fail_writes: Mutex::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn missing() -> Self {
        Self {
            capacity: Mutex::new(None),
            fail_writes: Mutex::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn capacity(&self) -> Option<u32> {
        *lock(&self.capacity)
    }

    /// `(capacity, honor_cooldown)` pairs written.
    pub fn writes(&self) -> Vec<(u32, bool)> {
        lock(&self.writes).clone()
    }

    pub fn fail_writes(&self) {
        *lock(&self.fail_writes) = true;
    }
}

#[async_trait]
impl ScalingGroupApi for FakeScalingGroup {
    async fn desired_capacity(&self, group: &str) -> BackendResult<u32> {
        (*lock(&self.capacity)).ok_or_else(|| BackendError::NotFound(group.to_string()))
    }

    async fn set_desired_capacity(
        &self,
        group: &str,
        capacity: u32,
        honor_cooldown: bool,
    ) -> BackendResult<()> {
        if *lock(&self.fail_writes) {
            return Err(BackendError::Rejected("ScalingActivityInProgress".to_string()));
        }
        let mut current = lock(&self.capacity);
        if current.is_none() {
            return Err(BackendError::NotFound(group.to_string()));
        }
        *current = Some(capacity);
        lock(&self.writes).push((capacity, honor_cooldown));
        Ok(())
    }
}

// ── Metric sink ────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeMetricSink {
    fail: Mutex<bool>,
    panic_on_put: Mutex<bool>,
    datapoints: Mutex<Vec<(String, String, f64, MetricUnit)>>,
}

impl FakeMetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        *lock(&self.fail) = true;
    }

    pub fn panic_on_put(&self) {
        *lock(&self.panic_on_put) = true;
    }

    /// `(namespace, name, value, unit)` tuples pushed.
    pub fn datapoints(&self) -> Vec<(String, String, f64, MetricUnit)> {
        lock(&self.datapoints).clone()
    }
}

#[async_trait]
impl MetricSink for FakeMetricSink {
    async fn put_metric(
        &self,
        namespace: &str,
        name: &str,
        value: f64,
        unit: MetricUnit,
    ) -> BackendResult<()> {
        if *lock(&self.panic_on_put) {
            panic!("metric sink blew up");
        }
        if *lock(&self.fail) {
            return Err(unavailable());
        }
        lock(&self.datapoints).push((namespace.to_string(), name.to_string(), value, unit));
        Ok(())
    }
}

// ── Alert channel ──────────────────────────────────────────────────

/// Channel that records every event it is asked to deliver, including
/// the ones it fails on.
pub struct RecordingChannel {
    name: String,
    fail: Mutex<bool>,
    attempts: Mutex<Vec<AlertEvent>>,
}

impl RecordingChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: Mutex::new(false),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str) -> Self {
        let channel = Self::new(name);
        channel.fail();
        channel
    }

    pub fn fail(&self) {
        *lock(&self.fail) = true;
    }

    pub fn attempts(&self) -> Vec<AlertEvent> {
        lock(&self.attempts).clone()
    }
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: &AlertEvent) -> BackendResult<()> {
        lock(&self.attempts).push(event.clone());
        if *lock(&self.fail) {
            return Err(BackendError::Status {
                code: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}
