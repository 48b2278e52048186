use super::batch::{BatchStatus, ItemStatus, PayoutBatch, PayoutBatchItem};
use super::context::PayoutRecipient;
use crate::error::{GatewayError, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A new batch with its line items, created atomically in Phase 1.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub cycle_id: i64,
    pub admin_id: i64,
    pub sender_batch_id: String,
    pub request_checksum: String,
    pub total_amount: i64,
    pub items: Vec<NewBatchItem>,
}

#[derive(Debug, Clone)]
pub struct NewBatchItem {
    pub recipient_user_id: i64,
    pub source_record_id: i64,
    pub payout_email: String,
    pub amount: i64,
    pub currency: String,
    pub note: String,
}

/// Persistence collaborator for the payout ledger.
///
/// Implementations must enforce the uniqueness of `sender_batch_id` across
/// non-rolled-back batches inside `create_batch` itself, so the idempotency
/// check is race-free, and must provide read-after-write consistency within
/// one orchestration call.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Look up the non-rolled-back batch carrying this sender batch id.
    async fn find_active_by_sender_batch_id(
        &self,
        sender_batch_id: &str,
    ) -> Result<Option<PayoutBatch>, StoreError>;

    /// Create a batch and its items in one atomic operation. Fails with
    /// `StoreError::DuplicateSenderBatchId` if an active batch already holds
    /// the same sender batch id.
    async fn create_batch(
        &self,
        batch: NewBatch,
    ) -> Result<(PayoutBatch, Vec<PayoutBatchItem>), StoreError>;

    async fn get_batch(&self, batch_id: i64) -> Result<Option<PayoutBatch>, StoreError>;

    /// Items in creation order (matching recipient submission order).
    async fn items_for_batch(&self, batch_id: i64) -> Result<Vec<PayoutBatchItem>, StoreError>;

    async fn update_batch(
        &self,
        batch_id: i64,
        status: BatchStatus,
        external_batch_id: Option<String>,
    ) -> Result<(), StoreError>;

    async fn update_item_statuses(
        &self,
        batch_id: i64,
        statuses: &[(i64, ItemStatus)],
    ) -> Result<(), StoreError>;

    /// Compensation write: mark the batch and all still-pending items as
    /// rolled back. Idempotent.
    async fn mark_rolled_back(&self, batch_id: i64) -> Result<(), StoreError>;
}

/// Per-recipient outcome reported by the external network, positional with
/// respect to the submitted recipient list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutItemStatus {
    Success,
    Failed,
    Unclaimed,
    Processing,
}

impl From<PayoutItemStatus> for ItemStatus {
    fn from(status: PayoutItemStatus) -> Self {
        match status {
            PayoutItemStatus::Success => ItemStatus::Success,
            PayoutItemStatus::Failed => ItemStatus::Failed,
            PayoutItemStatus::Unclaimed => ItemStatus::Unclaimed,
            PayoutItemStatus::Processing => ItemStatus::Processing,
        }
    }
}

/// Parsed response to one payout submission.
#[derive(Debug, Clone)]
pub struct PayoutSubmission {
    pub external_batch_id: String,
    /// One outcome per submitted recipient, in submission order.
    pub item_outcomes: Vec<PayoutItemStatus>,
}

/// External payout network collaborator.
///
/// The network is assumed to be idempotent keyed on `sender_batch_id`, so a
/// retried submission after a local crash cannot double-pay.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    async fn submit_payout(
        &self,
        sender_batch_id: &str,
        recipients: &[PayoutRecipient],
    ) -> Result<PayoutSubmission, GatewayError>;
}

pub type BatchStoreRef = Arc<dyn BatchStore>;
pub type PayoutGatewayRef = Arc<dyn PayoutGateway>;
