//! Defensive two-phase payout transaction orchestrator.
//!
//! Moves money from the platform to many recipients through an external
//! payout network while keeping the internal ledger (batches and line items)
//! consistent with the network's actual outcome. The pipeline layers a
//! validator, a circuit breaker, a concurrency limiter, and a deadline
//! governor around a two-phase executor with compensation.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

pub use application::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use application::deadline::Deadlines;
pub use application::limiter::ConcurrencyLimiter;
pub use application::orchestrator::{Orchestrator, TransactionResult};
pub use application::status::BatchStatusService;
