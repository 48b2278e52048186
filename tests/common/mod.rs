#![allow(dead_code)]

use async_trait::async_trait;
use disburse::domain::batch::{BatchStatus, ItemStatus, PayoutBatch, PayoutBatchItem};
use disburse::domain::context::{RawRecipient, RawTransactionRequest};
use disburse::domain::ports::{
    BatchStore, NewBatch, PayoutGateway, PayoutGatewayRef, PayoutSubmission,
};
use disburse::error::{GatewayError, StoreError};
use disburse::infrastructure::in_memory::InMemoryBatchStore;
use disburse::{CircuitBreaker, ConcurrencyLimiter, Orchestrator};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn recipient(email: &str, amount: i64) -> RawRecipient {
    RawRecipient {
        source_record_id: Some(1),
        user_id: Some(10),
        payout_email: Some(email.to_string()),
        amount: Some(amount),
        currency: Some("USD".to_string()),
        note: Some("August award".to_string()),
    }
}

/// A minimal valid request: one recipient, amounts consistent.
pub fn request(sender_batch_id: &str) -> RawTransactionRequest {
    RawTransactionRequest {
        cycle_id: Some(1),
        admin_id: Some(1),
        recipients: Some(vec![recipient("test@example.com", 2500)]),
        total_amount: Some(2500),
        request_id: Some("req-1".to_string()),
        sender_batch_id: Some(sender_batch_id.to_string()),
    }
}

pub fn request_with(sender_batch_id: &str, recipients: Vec<RawRecipient>) -> RawTransactionRequest {
    let total: i64 = recipients.iter().filter_map(|r| r.amount).sum();
    RawTransactionRequest {
        cycle_id: Some(1),
        admin_id: Some(1),
        recipients: Some(recipients),
        total_amount: Some(total),
        request_id: Some("req-1".to_string()),
        sender_batch_id: Some(sender_batch_id.to_string()),
    }
}

/// One orchestrator over a fresh in-memory ledger, with handles to every
/// collaborator so tests can observe and manipulate them.
pub struct Harness {
    pub store: Arc<InMemoryBatchStore>,
    pub breaker: Arc<CircuitBreaker>,
    pub limiter: Arc<ConcurrencyLimiter>,
    pub orchestrator: Orchestrator,
}

pub fn harness(gateway: PayoutGatewayRef) -> Harness {
    harness_over(Arc::new(InMemoryBatchStore::new()), gateway)
}

/// Harness sharing an existing ledger, for retry scenarios.
pub fn harness_over(store: Arc<InMemoryBatchStore>, gateway: PayoutGatewayRef) -> Harness {
    let breaker = Arc::new(CircuitBreaker::default());
    let limiter = Arc::new(ConcurrencyLimiter::default());
    let orchestrator = Orchestrator::new(
        store.clone(),
        gateway,
        breaker.clone(),
        limiter.clone(),
    );
    Harness {
        store,
        breaker,
        limiter,
        orchestrator,
    }
}

/// A gateway that panics instead of answering, for panic-boundary tests.
pub struct PanickingGateway;

#[async_trait]
impl PayoutGateway for PanickingGateway {
    async fn submit_payout(
        &self,
        _sender_batch_id: &str,
        _recipients: &[disburse::domain::context::PayoutRecipient],
    ) -> Result<PayoutSubmission, GatewayError> {
        panic!("gateway wiring bug");
    }
}

/// Wraps the in-memory store and fails selected operations on demand, for
/// compensation-failure scenarios.
pub struct FaultyStore {
    inner: InMemoryBatchStore,
    fail_rollback: AtomicBool,
    fail_item_updates: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryBatchStore::new(),
            fail_rollback: AtomicBool::new(false),
            fail_item_updates: AtomicBool::new(false),
        }
    }

    pub fn fail_rollback(&self) {
        self.fail_rollback.store(true, Ordering::SeqCst);
    }

    pub fn fail_item_updates(&self) {
        self.fail_item_updates.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BatchStore for FaultyStore {
    async fn find_active_by_sender_batch_id(
        &self,
        sender_batch_id: &str,
    ) -> Result<Option<PayoutBatch>, StoreError> {
        self.inner.find_active_by_sender_batch_id(sender_batch_id).await
    }

    async fn create_batch(
        &self,
        batch: NewBatch,
    ) -> Result<(PayoutBatch, Vec<PayoutBatchItem>), StoreError> {
        self.inner.create_batch(batch).await
    }

    async fn get_batch(&self, batch_id: i64) -> Result<Option<PayoutBatch>, StoreError> {
        self.inner.get_batch(batch_id).await
    }

    async fn items_for_batch(&self, batch_id: i64) -> Result<Vec<PayoutBatchItem>, StoreError> {
        self.inner.items_for_batch(batch_id).await
    }

    async fn update_batch(
        &self,
        batch_id: i64,
        status: BatchStatus,
        external_batch_id: Option<String>,
    ) -> Result<(), StoreError> {
        self.inner.update_batch(batch_id, status, external_batch_id).await
    }

    async fn update_item_statuses(
        &self,
        batch_id: i64,
        statuses: &[(i64, ItemStatus)],
    ) -> Result<(), StoreError> {
        if self.fail_item_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("item update rejected".to_string()));
        }
        self.inner.update_item_statuses(batch_id, statuses).await
    }

    async fn mark_rolled_back(&self, batch_id: i64) -> Result<(), StoreError> {
        if self.fail_rollback.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("rollback rejected".to_string()));
        }
        self.inner.mark_rolled_back(batch_id).await
    }
}
