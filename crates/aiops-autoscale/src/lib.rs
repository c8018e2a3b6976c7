//! aiops-autoscale — load-driven capacity escalation.
//!
//! Compares each tick's CPU sample against a fixed threshold and, when it
//! is exceeded, adds capacity one step at a time across two tiers.
//!
//! # Escalation Algorithm
//!
//! ```text
//! if sample <= cpu_threshold:
//!     None
//!
//! if cooldown > 0 and last successful scale < cooldown ago:
//!     CoolingDown
//!
//! tier 1: replicas = deployment.replicas
//!         if replicas < max_replicas:
//!             patch deployment to replicas + 1, confirm
//!             ScaledOrchestrator(replicas + 1)
//!
//! tier 2: (tier 1 saturated or failed, same tick)
//!         capacity = group.desired_capacity
//!         set desired capacity to capacity + 1, honor_cooldown = false
//!         ScaledInfra(capacity + 1)
//!
//! otherwise ScaleFailed
//! ```
//!
//! Only one increment is made per tick, so a bad reading costs at most
//! one replica or one node before the next sample is taken.

pub mod escalator;

pub use escalator::{EscalationPolicy, ScalingEscalator, ScalingState, ScalingTargets};
