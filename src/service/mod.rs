//! Service layer: fan-out, session gating, liveness and their assembly.
//!
//! [`RelayService`] owns the process-local registry and hands it to the
//! [`FanoutRouter`] and [`LivenessMonitor`]; connection sessions reach
//! everything through it.

pub mod fanout;
pub mod liveness;
pub mod relay_service;
pub mod session_gate;

pub use fanout::{FanoutOutcome, FanoutRouter};
pub use liveness::{LivenessMonitor, LivenessSweep, MIN_LIVENESS_INTERVAL};
pub use relay_service::{RelayParts, RelayService, RelayWorkers};
pub use session_gate::{GateEvent, GateSender, GateTask, SessionGate};
