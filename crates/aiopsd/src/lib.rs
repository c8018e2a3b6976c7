//! aiopsd — the AIOps control loop.
//!
//! Wires the sampler, health reconciler, scaling escalator and alert
//! dispatcher into one fixed-interval loop. The binary in `main.rs`
//! builds the production collaborators; tests drive the same loop with
//! the in-memory fakes from `aiops_core::testing`.

pub mod control_loop;

pub use control_loop::{Collaborators, ControlLoop, TickReport, TickStage};
