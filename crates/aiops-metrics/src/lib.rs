//! aiops-metrics — the load signal the control loop decides on.
//!
//! Pulls one aggregate CPU reading per tick from a Prometheus-compatible
//! backend and pushes it on to a telemetry sink.
//!
//! # Architecture
//!
//! ```text
//! MetricSampler
//!   ├── try_sample() → Result<LoadSample, SampleError>
//!   └── sample()     → LoadSample (0 on any failure)
//!         └── dyn MetricsBackend ← PrometheusClient (GET /api/v1/query)
//!
//! TelemetryPublisher
//!   └── publish(sample) → dyn MetricSink (fire-and-forget)
//! ```
//!
//! A metrics outage reads as "no load": the loop errs toward doing
//! nothing rather than scaling on bad data.

pub mod prometheus;
pub mod sampler;
pub mod telemetry;

pub use prometheus::PrometheusClient;
pub use sampler::{MetricSampler, SampleError};
pub use telemetry::TelemetryPublisher;
