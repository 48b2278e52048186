use std::time::Duration;
use thiserror::Error;

/// Failures reported by the persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The unique constraint on `sender_batch_id` rejected the insert.
    #[error("duplicate sender batch id: {0}")]
    DuplicateSenderBatchId(String),
    #[error("batch not found: {0}")]
    BatchNotFound(i64),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failures reported by the external payout network.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("payout submission failed: {0}")]
    Submission(String),
    #[error("malformed payout response: {0}")]
    MalformedResponse(String),
}

/// Failures of the batch-status and retry surface.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("batch {0} has no failed items to retry")]
    NoFailedItems(i64),
}

/// The phase that was in flight when a deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Commit,
    Rollback,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Prepare => write!(f, "phase 1"),
            Phase::Commit => write!(f, "phase 2"),
            Phase::Rollback => write!(f, "rollback"),
        }
    }
}

/// Everything that can go wrong in one orchestration attempt.
///
/// Expected failures travel inside `TransactionResult` as this type rendered
/// to strings; nothing is propagated across the orchestrator boundary as a
/// panic except genuine programmer errors, and even those are caught at the
/// outermost boundary and converted into `Internal`.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("Input validation failed")]
    Validation { errors: Vec<String> },

    #[error("Circuit breaker protection active: retry in {}s", retry_in.as_secs())]
    CircuitOpen { retry_in: Duration },

    #[error("Resource protection active: Maximum concurrent operations reached: {active}/{limit}")]
    ResourceExhausted { active: u32, limit: u32 },

    /// Local persistence failed before any external call; no compensation
    /// is needed.
    #[error("Phase 1 failed: {0}")]
    Phase1(StoreError),

    /// The external call failed or its response could not be reconciled;
    /// compensation has been attempted.
    #[error("Phase 2 failed: {0}")]
    Phase2(GatewayError),

    /// Compensation itself failed. The ledger may now disagree with the
    /// external network and requires manual reconciliation.
    #[error("Rollback failed: {0}")]
    RollbackFailed(StoreError),

    #[error("Rollback timeout after {} seconds", budget.as_secs())]
    RollbackTimeout { budget: Duration },

    #[error("{phase} timeout after {} seconds", budget.as_secs())]
    PhaseTimeout { phase: Phase, budget: Duration },

    #[error("Transaction timeout after {} seconds", budget.as_secs())]
    TransactionTimeout { budget: Duration },

    /// A caught panic from the executor: a programmer error surfaced as a
    /// structured failure instead of crossing the orchestrator boundary.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestrationError {
    /// Render this error into the flat message list carried by
    /// `TransactionResult`.
    pub fn messages(&self) -> Vec<String> {
        match self {
            OrchestrationError::Validation { errors } => {
                let mut out = vec![self.to_string()];
                out.extend(errors.iter().cloned());
                out
            }
            other => vec![other.to_string()],
        }
    }
}
