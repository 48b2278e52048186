//! Application layer: the defensive orchestration pipeline.
//!
//! The `Orchestrator` is the primary entry point. It sequences validation,
//! circuit-breaker admission, concurrency limiting, and the two-phase
//! executor under the deadline governor, and reports a single structured
//! outcome per call.

pub mod breaker;
pub mod deadline;
pub mod executor;
pub mod limiter;
pub mod orchestrator;
pub mod status;
pub mod validator;
