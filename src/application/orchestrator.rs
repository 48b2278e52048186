use crate::application::breaker::CircuitBreaker;
use crate::application::deadline::{DeadlineGovernor, Deadlines};
use crate::application::executor::{
    ExecutionReport, Phase1Outcome, Phase2Outcome, TwoPhaseExecutor,
};
use crate::application::limiter::ConcurrencyLimiter;
use crate::application::validator::validate;
use crate::domain::context::RawTransactionRequest;
use crate::domain::ports::{BatchStoreRef, PayoutGatewayRef};
use crate::error::OrchestrationError;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The single structured outcome of one orchestration call. Errors are
/// captured here rather than thrown across the boundary, so the route layer
/// always receives a result it can render.
#[derive(Debug, Serialize)]
pub struct TransactionResult {
    pub success: bool,
    pub phase1: Option<Phase1Outcome>,
    pub phase2: Option<Phase2Outcome>,
    pub rollback_performed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl TransactionResult {
    fn rejected(error: OrchestrationError) -> Self {
        Self {
            success: false,
            phase1: None,
            phase2: None,
            rollback_performed: false,
            errors: error.messages(),
            warnings: Vec::new(),
        }
    }

    fn from_report(report: ExecutionReport) -> Self {
        Self {
            success: report.succeeded(),
            errors: report.errors.iter().flat_map(|e| e.messages()).collect(),
            phase1: report.phase1,
            phase2: report.phase2,
            rollback_performed: report.rollback_performed,
            warnings: report.warnings,
        }
    }
}

/// Top-level coordinator: a deterministic, short-circuiting pipeline of
/// validation, circuit-breaker check, concurrency admission, the two-phase
/// executor under deadlines, breaker recording, and guaranteed slot release.
pub struct Orchestrator {
    executor: TwoPhaseExecutor,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<ConcurrencyLimiter>,
    deadlines: Deadlines,
}

impl Orchestrator {
    pub fn new(
        store: BatchStoreRef,
        gateway: PayoutGatewayRef,
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<ConcurrencyLimiter>,
    ) -> Self {
        Self {
            executor: TwoPhaseExecutor::new(store, gateway),
            breaker,
            limiter,
            deadlines: Deadlines::default(),
        }
    }

    /// Override the timeout budgets (tests shrink them).
    pub fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    /// Execute one payout transaction end to end.
    ///
    /// Stage order is fixed: a request that fails validation never touches
    /// the breaker or the limiter, and a breaker rejection takes precedence
    /// over resource-protection rejection. The breaker records exactly one
    /// outcome per attempt that reached the external network (duplicate
    /// short-circuits record nothing), before the operation slot is
    /// released.
    pub async fn execute_transaction(&self, raw: &RawTransactionRequest) -> TransactionResult {
        let ctx = match validate(raw) {
            Ok(ctx) => ctx,
            Err(errors) => {
                warn!(error_count = errors.len(), "payout request rejected by validator");
                return TransactionResult::rejected(OrchestrationError::Validation { errors });
            }
        };

        if let Err(retry_in) = self.breaker.check() {
            warn!(retry_in_secs = retry_in.as_secs(), "payout rejected, circuit open");
            return TransactionResult::rejected(OrchestrationError::CircuitOpen { retry_in });
        }

        let slot = match self.limiter.acquire() {
            Ok(slot) => slot,
            Err(active) => {
                return TransactionResult::rejected(OrchestrationError::ResourceExhausted {
                    active,
                    limit: self.limiter.limit(),
                });
            }
        };

        info!(
            cycle_id = ctx.cycle_id,
            admin_id = ctx.admin_id,
            recipients = ctx.recipients.len(),
            total_amount = ctx.total_amount,
            sender_batch_id = %ctx.sender_batch_id,
            "payout transaction started"
        );

        let governor = DeadlineGovernor::start(self.deadlines);
        let report = match AssertUnwindSafe(self.executor.execute(&ctx, &governor))
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(%message, "executor panicked");
                let mut report = ExecutionReport::default();
                report.errors.push(OrchestrationError::Internal(message));
                report
            }
        };

        // A duplicate short-circuit never touched the network, so it is
        // evidence of nothing: recording it while half-open would attest a
        // recovery no probe demonstrated.
        let duplicate_short_circuit = report.phase1.as_ref().is_some_and(|p| p.duplicate)
            && report.phase2.is_none();
        if !duplicate_short_circuit {
            if report.succeeded() {
                self.breaker.record_success();
            } else {
                self.breaker.record_failure();
            }
        }
        drop(slot);

        let result = TransactionResult::from_report(report);
        info!(
            success = result.success,
            rollback_performed = result.rollback_performed,
            "payout transaction finished"
        );
        result
    }
}
