//! aiops-core — shared vocabulary for the AIOps control loop.
//!
//! Holds the domain types passed between stages, the process
//! configuration, the typed collaborator errors, and the traits that
//! every external backend (metrics, orchestrator, cloud autoscaling,
//! metric sink, notification channels) is reached through.
//!
//! # Architecture
//!
//! ```text
//! aiops-core
//!   ├── types    LoadSample, WorkloadInstance, ScaleAction, AlertEvent
//!   ├── config   AiopsConfig (defaults → TOML file → environment)
//!   ├── error    BackendError, ConfigError
//!   ├── backend  MetricsBackend, Orchestrator, ScalingGroupApi,
//!   │            MetricSink, AlertChannel
//!   └── deadline with_deadline() per-call timeout wrapper
//! ```
//!
//! Components never reach a backend except through these traits, so the
//! control loop can be driven entirely by the in-memory fakes in
//! [`testing`] (enabled with the `testing` feature).

pub mod backend;
pub mod config;
pub mod deadline;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{AlertChannel, MetricSink, MetricsBackend, Orchestrator, ScalingGroupApi};
pub use config::{AiopsConfig, parse_duration};
pub use deadline::with_deadline;
pub use error::{BackendError, BackendResult, ConfigError};
pub use types::*;
