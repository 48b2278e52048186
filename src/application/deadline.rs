use crate::error::{OrchestrationError, Phase};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, timeout};

/// Timeout budgets for one orchestration run. The defaults are platform
/// policy; tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    /// Budget for the whole transaction from orchestration start.
    pub overall: Duration,
    /// Budget for Phase 1 (local intent).
    pub phase1: Duration,
    /// Budget for Phase 2 (external call + reconciliation).
    pub phase2: Duration,
    /// Budget for the emergency rollback path.
    pub rollback: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            overall: Duration::from_secs(1800),
            phase1: Duration::from_secs(60),
            phase2: Duration::from_secs(600),
            rollback: Duration::from_secs(60),
        }
    }
}

/// Imposes the overall deadline and the per-phase budgets on one run.
///
/// Each phase races against the smaller of its own budget and the remaining
/// overall budget, so a hang in one phase never consumes more than its share
/// before the caller learns the operation has stalled. The rollback budget is
/// deliberately not clipped by the overall deadline: pessimistic ledger
/// reconciliation must still get its chance after a Phase 2 that burned the
/// whole transaction budget.
#[derive(Debug)]
pub struct DeadlineGovernor {
    deadlines: Deadlines,
    started: Instant,
}

impl DeadlineGovernor {
    pub fn start(deadlines: Deadlines) -> Self {
        Self {
            deadlines,
            started: Instant::now(),
        }
    }

    fn remaining_overall(&self) -> Duration {
        self.deadlines.overall.saturating_sub(self.started.elapsed())
    }

    /// Run one phase under its budget. A fired deadline maps to the phase
    /// timeout when the phase budget was the binding constraint, and to the
    /// transaction timeout when the overall budget was.
    pub async fn bound<T, F>(&self, phase: Phase, fut: F) -> Result<T, OrchestrationError>
    where
        F: Future<Output = T>,
    {
        let (budget, effective) = match phase {
            Phase::Prepare => {
                let remaining = self.remaining_overall();
                (self.deadlines.phase1, self.deadlines.phase1.min(remaining))
            }
            Phase::Commit => {
                let remaining = self.remaining_overall();
                (self.deadlines.phase2, self.deadlines.phase2.min(remaining))
            }
            Phase::Rollback => (self.deadlines.rollback, self.deadlines.rollback),
        };

        match timeout(effective, fut).await {
            Ok(value) => Ok(value),
            Err(_) => Err(self.timeout_error(phase, budget, effective)),
        }
    }

    fn timeout_error(
        &self,
        phase: Phase,
        budget: Duration,
        effective: Duration,
    ) -> OrchestrationError {
        match phase {
            Phase::Rollback => OrchestrationError::RollbackTimeout { budget },
            _ if effective < budget => OrchestrationError::TransactionTimeout {
                budget: self.deadlines.overall,
            },
            _ => OrchestrationError::PhaseTimeout { phase, budget },
        }
    }
}
