//! aiops-kube — the orchestrator collaborator for Kubernetes.
//!
//! A thin client over the four API calls the control loop needs:
//!
//! ```text
//! GET    /apis/apps/v1/namespaces/{ns}/deployments/{name}   → spec.replicas
//! PATCH  /apis/apps/v1/namespaces/{ns}/deployments/{name}   merge-patch spec.replicas
//! GET    /api/v1/namespaces/{ns}/pods                       → name, labels, restarts
//! DELETE /api/v1/namespaces/{ns}/pods/{name}
//! ```
//!
//! In-cluster credentials (service-account token and CA bundle) are
//! loaded once at startup; failing to load them is fatal.

pub mod client;
pub mod error;
mod wire;

pub use client::KubeClient;
pub use error::KubeConfigError;
