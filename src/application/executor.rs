use crate::application::deadline::DeadlineGovernor;
use crate::domain::batch::{BatchStatus, ItemStatus, PayoutBatch};
use crate::domain::context::TransactionContext;
use crate::domain::ports::{BatchStoreRef, NewBatch, NewBatchItem, PayoutGatewayRef};
use crate::error::{GatewayError, OrchestrationError, Phase, StoreError};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Result of Phase 1 (durable local intent).
#[derive(Debug, Clone, Serialize)]
pub struct Phase1Outcome {
    pub batch_id: i64,
    pub sender_batch_id: String,
    pub request_checksum: String,
    /// True when an active batch with the same sender batch id already
    /// existed and the call short-circuited.
    pub duplicate: bool,
}

/// Result of Phase 2 (external submission + reconciliation).
#[derive(Debug, Clone, Serialize)]
pub struct Phase2Outcome {
    pub external_batch_id: Option<String>,
    pub successful_count: usize,
    pub failed_count: usize,
    pub unclaimed_count: usize,
    /// Items still processing asynchronously on the network side.
    pub pending_count: usize,
}

/// Everything the executor learned during one run, failures included.
/// The orchestrator flattens this into the caller-facing result.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub phase1: Option<Phase1Outcome>,
    pub phase2: Option<Phase2Outcome>,
    pub rollback_performed: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<OrchestrationError>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

enum Prepared {
    Created(PayoutBatch),
    Duplicate(PayoutBatch),
}

enum CommitError {
    /// The external call failed or its response was unusable; nothing is
    /// confirmed on the network side, so compensation applies.
    Gateway(GatewayError),
    /// The submission succeeded but the ledger write afterwards failed.
    /// Money may have moved; rolling back would falsify the ledger.
    Ledger(StoreError),
}

/// Two-phase transaction executor: Phase 1 records intent durably, Phase 2
/// calls the external payout API and reconciles the outcome into the ledger,
/// compensating when the outcome cannot be confirmed.
pub struct TwoPhaseExecutor {
    store: BatchStoreRef,
    gateway: PayoutGatewayRef,
}

impl TwoPhaseExecutor {
    pub fn new(store: BatchStoreRef, gateway: PayoutGatewayRef) -> Self {
        Self { store, gateway }
    }

    /// Run both phases under the deadline governor. Never panics for
    /// expected failures; everything lands in the report.
    pub async fn execute(
        &self,
        ctx: &TransactionContext,
        governor: &DeadlineGovernor,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        let batch = match governor.bound(Phase::Prepare, self.prepare(ctx)).await {
            Ok(Ok(Prepared::Created(batch))) => {
                report.phase1 = Some(Phase1Outcome {
                    batch_id: batch.id,
                    sender_batch_id: batch.sender_batch_id.clone(),
                    request_checksum: batch.request_checksum.clone(),
                    duplicate: false,
                });
                batch
            }
            Ok(Ok(Prepared::Duplicate(existing))) => {
                info!(
                    batch_id = existing.id,
                    sender_batch_id = %existing.sender_batch_id,
                    "duplicate payout request short-circuited"
                );
                report.warnings.push(format!(
                    "Duplicate request: active batch {} already exists for sender batch id '{}'",
                    existing.id, existing.sender_batch_id
                ));
                report.phase1 = Some(Phase1Outcome {
                    batch_id: existing.id,
                    sender_batch_id: existing.sender_batch_id,
                    request_checksum: existing.request_checksum,
                    duplicate: true,
                });
                return report;
            }
            Ok(Err(store_err)) => {
                // Nothing external happened, so no compensation is needed.
                report.errors.push(OrchestrationError::Phase1(store_err));
                return report;
            }
            Err(timeout_err) => {
                report.errors.push(timeout_err);
                return report;
            }
        };

        match governor.bound(Phase::Commit, self.commit(ctx, &batch)).await {
            Ok(Ok(outcome)) => {
                report.phase2 = Some(outcome);
                report
            }
            Ok(Err(CommitError::Ledger(store_err))) => {
                error!(
                    batch_id = batch.id,
                    error = %store_err,
                    "ledger update failed after submission, manual reconciliation required"
                );
                report.errors.push(OrchestrationError::Internal(format!(
                    "ledger update failed after submission: {store_err}; manual reconciliation required"
                )));
                report
            }
            Ok(Err(CommitError::Gateway(gateway_err))) => {
                report.errors.push(OrchestrationError::Phase2(gateway_err));
                self.compensate(batch.id, governor, &mut report).await;
                report
            }
            Err(timeout_err) => {
                // The in-flight call is abandoned; reconcile pessimistically.
                report.errors.push(timeout_err);
                self.compensate(batch.id, governor, &mut report).await;
                report
            }
        }
    }

    /// Phase 1: idempotency probe, then durable intent. Purely local.
    async fn prepare(&self, ctx: &TransactionContext) -> Result<Prepared, StoreError> {
        if let Some(existing) = self
            .store
            .find_active_by_sender_batch_id(&ctx.sender_batch_id)
            .await?
        {
            return Ok(Prepared::Duplicate(existing));
        }

        let new_batch = NewBatch {
            cycle_id: ctx.cycle_id,
            admin_id: ctx.admin_id,
            sender_batch_id: ctx.sender_batch_id.clone(),
            request_checksum: ctx.checksum(),
            total_amount: ctx.total_amount,
            items: ctx
                .recipients
                .iter()
                .map(|r| NewBatchItem {
                    recipient_user_id: r.user_id,
                    source_record_id: r.source_record_id,
                    payout_email: r.payout_email.clone(),
                    amount: r.amount,
                    currency: r.currency.clone(),
                    note: r.note.clone(),
                })
                .collect(),
        };

        match self.store.create_batch(new_batch).await {
            Ok((batch, items)) => {
                info!(
                    batch_id = batch.id,
                    items = items.len(),
                    total_amount = batch.total_amount,
                    "payout intent recorded"
                );
                Ok(Prepared::Created(batch))
            }
            // A concurrent identical request won the insert race; observe
            // its batch and short-circuit.
            Err(StoreError::DuplicateSenderBatchId(_)) => {
                let existing = self
                    .store
                    .find_active_by_sender_batch_id(&ctx.sender_batch_id)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Backend(
                            "duplicate insert rejected but no active batch found".to_string(),
                        )
                    })?;
                Ok(Prepared::Duplicate(existing))
            }
            Err(other) => Err(other),
        }
    }

    /// Phase 2: one submission to the external network tagged with the same
    /// sender batch id, then reconcile per-item outcomes into the ledger.
    async fn commit(
        &self,
        ctx: &TransactionContext,
        batch: &PayoutBatch,
    ) -> Result<Phase2Outcome, CommitError> {
        let submission = self
            .gateway
            .submit_payout(&batch.sender_batch_id, &ctx.recipients)
            .await
            .map_err(CommitError::Gateway)?;

        if submission.item_outcomes.len() != ctx.recipients.len() {
            return Err(CommitError::Gateway(GatewayError::MalformedResponse(
                format!(
                    "expected {} item outcomes, got {}",
                    ctx.recipients.len(),
                    submission.item_outcomes.len()
                ),
            )));
        }

        let items = self
            .store
            .items_for_batch(batch.id)
            .await
            .map_err(CommitError::Ledger)?;

        let mut successful_count = 0;
        let mut failed_count = 0;
        let mut unclaimed_count = 0;
        let mut pending_count = 0;
        let statuses: Vec<(i64, ItemStatus)> = items
            .iter()
            .zip(submission.item_outcomes.iter())
            .map(|(item, outcome)| {
                let status: ItemStatus = (*outcome).into();
                match status {
                    ItemStatus::Success => successful_count += 1,
                    ItemStatus::Failed => failed_count += 1,
                    ItemStatus::Unclaimed => unclaimed_count += 1,
                    ItemStatus::Processing => pending_count += 1,
                    _ => {}
                }
                (item.id, status)
            })
            .collect();

        self.store
            .update_item_statuses(batch.id, &statuses)
            .await
            .map_err(CommitError::Ledger)?;

        let batch_status = if pending_count == 0 {
            BatchStatus::Completed
        } else {
            BatchStatus::Submitted
        };
        self.store
            .update_batch(
                batch.id,
                batch_status,
                Some(submission.external_batch_id.clone()),
            )
            .await
            .map_err(CommitError::Ledger)?;

        info!(
            batch_id = batch.id,
            external_batch_id = %submission.external_batch_id,
            successful_count,
            failed_count,
            unclaimed_count,
            pending_count,
            "payout batch reconciled"
        );

        Ok(Phase2Outcome {
            external_batch_id: Some(submission.external_batch_id),
            successful_count,
            failed_count,
            unclaimed_count,
            pending_count,
        })
    }

    /// Compensate Phase 1 state after an unconfirmed Phase 2. A failing or
    /// timed-out rollback is escalated as its own error category and never
    /// retried here, to avoid unbounded recursion.
    async fn compensate(
        &self,
        batch_id: i64,
        governor: &DeadlineGovernor,
        report: &mut ExecutionReport,
    ) {
        debug!(batch_id, "rolling back payout intent");
        match governor
            .bound(Phase::Rollback, self.store.mark_rolled_back(batch_id))
            .await
        {
            Ok(Ok(())) => {
                report.rollback_performed = true;
                info!(batch_id, "payout intent rolled back");
            }
            Ok(Err(store_err)) => {
                error!(
                    batch_id,
                    error = %store_err,
                    "rollback failed, ledger requires manual reconciliation"
                );
                self.flag_for_reconciliation(batch_id).await;
                report
                    .errors
                    .push(OrchestrationError::RollbackFailed(store_err));
            }
            Err(timeout_err) => {
                error!(
                    batch_id,
                    "rollback timed out, ledger requires manual reconciliation"
                );
                self.flag_for_reconciliation(batch_id).await;
                report.errors.push(timeout_err);
            }
        }
    }

    /// Best-effort marker so operators can find batches whose compensation
    /// did not complete.
    async fn flag_for_reconciliation(&self, batch_id: i64) {
        if let Err(err) = self
            .store
            .update_batch(batch_id, BatchStatus::Failed, None)
            .await
        {
            warn!(batch_id, error = %err, "could not flag batch as failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::deadline::Deadlines;
    use crate::domain::context::PayoutRecipient;
    use crate::infrastructure::in_memory::InMemoryBatchStore;
    use crate::infrastructure::simulated::SimulatedGateway;
    use crate::domain::ports::{BatchStore, PayoutItemStatus};
    use std::sync::Arc;

    fn context() -> TransactionContext {
        TransactionContext {
            cycle_id: 1,
            admin_id: 1,
            recipients: vec![
                PayoutRecipient {
                    source_record_id: 1,
                    user_id: 10,
                    payout_email: "a@example.com".to_string(),
                    amount: 1500,
                    currency: "USD".to_string(),
                    note: String::new(),
                },
                PayoutRecipient {
                    source_record_id: 2,
                    user_id: 11,
                    payout_email: "b@example.com".to_string(),
                    amount: 1000,
                    currency: "USD".to_string(),
                    note: String::new(),
                },
            ],
            total_amount: 2500,
            request_id: "req-1".to_string(),
            sender_batch_id: "batch-1".to_string(),
        }
    }

    fn governor() -> DeadlineGovernor {
        DeadlineGovernor::start(Deadlines::default())
    }

    #[tokio::test]
    async fn test_happy_path_completes_batch() {
        let store = Arc::new(InMemoryBatchStore::new());
        let gateway = Arc::new(SimulatedGateway::succeeding());
        let executor = TwoPhaseExecutor::new(store.clone(), gateway);

        let report = executor.execute(&context(), &governor()).await;
        assert!(report.succeeded());
        assert!(!report.rollback_performed);

        let phase2 = report.phase2.unwrap();
        assert_eq!(phase2.successful_count, 2);
        assert_eq!(phase2.pending_count, 0);

        let batch_id = report.phase1.unwrap().batch_id;
        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert!(batch.external_batch_id.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_short_circuits_without_submission() {
        let store = Arc::new(InMemoryBatchStore::new());
        let gateway = Arc::new(SimulatedGateway::succeeding());
        let executor = TwoPhaseExecutor::new(store, gateway.clone());

        let first = executor.execute(&context(), &governor()).await;
        assert!(first.succeeded());

        let second = executor.execute(&context(), &governor()).await;
        assert!(second.succeeded());
        assert!(second.phase1.unwrap().duplicate);
        assert!(second.phase2.is_none());
        assert_eq!(gateway.submissions(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_rolls_back() {
        let store = Arc::new(InMemoryBatchStore::new());
        let gateway = Arc::new(SimulatedGateway::failing("network unreachable"));
        let executor = TwoPhaseExecutor::new(store.clone(), gateway);

        let report = executor.execute(&context(), &governor()).await;
        assert!(!report.succeeded());
        assert!(report.rollback_performed);
        assert!(matches!(
            report.errors[0],
            OrchestrationError::Phase2(GatewayError::Submission(_))
        ));

        let batch_id = report.phase1.unwrap().batch_id;
        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::RolledBack);
        for item in store.items_for_batch(batch_id).await.unwrap() {
            assert_eq!(item.status, ItemStatus::RolledBack);
        }
    }

    #[tokio::test]
    async fn test_short_response_is_malformed() {
        let store = Arc::new(InMemoryBatchStore::new());
        // One outcome for two recipients.
        let gateway = Arc::new(SimulatedGateway::with_outcomes(vec![
            PayoutItemStatus::Success,
        ]));
        let executor = TwoPhaseExecutor::new(store, gateway);

        let report = executor.execute(&context(), &governor()).await;
        assert!(!report.succeeded());
        assert!(report.rollback_performed);
        assert!(matches!(
            report.errors[0],
            OrchestrationError::Phase2(GatewayError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_processing_items_leave_batch_submitted() {
        let store = Arc::new(InMemoryBatchStore::new());
        let gateway = Arc::new(SimulatedGateway::with_outcomes(vec![
            PayoutItemStatus::Success,
            PayoutItemStatus::Processing,
        ]));
        let executor = TwoPhaseExecutor::new(store.clone(), gateway);

        let report = executor.execute(&context(), &governor()).await;
        assert!(report.succeeded());
        let phase2 = report.phase2.unwrap();
        assert_eq!(phase2.pending_count, 1);

        let batch_id = report.phase1.unwrap().batch_id;
        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Submitted);
    }

    #[tokio::test]
    async fn test_partial_failure_still_completes() {
        let store = Arc::new(InMemoryBatchStore::new());
        let gateway = Arc::new(SimulatedGateway::with_outcomes(vec![
            PayoutItemStatus::Success,
            PayoutItemStatus::Unclaimed,
        ]));
        let executor = TwoPhaseExecutor::new(store.clone(), gateway);

        let report = executor.execute(&context(), &governor()).await;
        assert!(report.succeeded());
        let phase2 = report.phase2.unwrap();
        assert_eq!(phase2.successful_count, 1);
        assert_eq!(phase2.unclaimed_count, 1);

        let batch_id = report.phase1.unwrap().batch_id;
        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
    }
}
