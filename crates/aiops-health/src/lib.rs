//! aiops-health — self-healing for the managed workload.
//!
//! Each pass lists the pods in the workload's namespace and deletes the
//! ones that match the workload selector and have restarted more often
//! than the threshold. The orchestrator's own supervision recreates them.
//!
//! # Architecture
//!
//! ```text
//! HealthReconciler
//!   ├── RestartPolicy (selector + restart threshold)
//!   ├── Orchestrator::list_pods()   → [WorkloadInstance]
//!   └── Orchestrator::delete_pod()  for each instance over threshold
//! ```
//!
//! # Policy
//!
//! Deletion does not tell crash loops from transient restarts, and there
//! is no backoff: a replacement that restarts quickly is deleted again
//! on a later pass. A recreated pod starts from a zero restart count, so
//! the policy limits itself.

pub mod policy;
pub mod reconciler;

pub use policy::RestartPolicy;
pub use reconciler::{HealthReconciler, ReconcileReport};
