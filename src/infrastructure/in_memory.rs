use crate::domain::batch::{BatchStatus, ItemStatus, PayoutBatch, PayoutBatchItem};
use crate::domain::ports::{BatchStore, NewBatch};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    batches: HashMap<i64, PayoutBatch>,
    /// Items per batch, in creation (= submission) order.
    items: HashMap<i64, Vec<PayoutBatchItem>>,
    next_batch_id: i64,
    next_item_id: i64,
}

/// A thread-safe in-memory payout ledger.
///
/// Enforces the same constraints a relational backend would: uniqueness of
/// `sender_batch_id` across non-rolled-back batches (checked inside the
/// write lock, so the idempotency probe is race-free) and conservation of
/// the batch total against its item amounts at creation.
#[derive(Default, Clone)]
pub struct InMemoryBatchStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchStore for InMemoryBatchStore {
    async fn find_active_by_sender_batch_id(
        &self,
        sender_batch_id: &str,
    ) -> Result<Option<PayoutBatch>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .batches
            .values()
            .find(|b| b.sender_batch_id == sender_batch_id && b.status != BatchStatus::RolledBack)
            .cloned())
    }

    async fn create_batch(
        &self,
        batch: NewBatch,
    ) -> Result<(PayoutBatch, Vec<PayoutBatchItem>), StoreError> {
        let mut inner = self.inner.write().await;

        let duplicate = inner.batches.values().any(|b| {
            b.sender_batch_id == batch.sender_batch_id && b.status != BatchStatus::RolledBack
        });
        if duplicate {
            return Err(StoreError::DuplicateSenderBatchId(batch.sender_batch_id));
        }

        let item_sum: i64 = batch.items.iter().map(|i| i.amount).sum();
        if item_sum != batch.total_amount {
            return Err(StoreError::Backend(format!(
                "item amounts sum to {item_sum} but batch total is {}",
                batch.total_amount
            )));
        }

        inner.next_batch_id += 1;
        let batch_id = inner.next_batch_id;
        let now = SystemTime::now();

        let row = PayoutBatch {
            id: batch_id,
            cycle_id: batch.cycle_id,
            admin_id: batch.admin_id,
            sender_batch_id: batch.sender_batch_id,
            request_checksum: batch.request_checksum,
            total_amount: batch.total_amount,
            status: BatchStatus::Intent,
            external_batch_id: None,
            created_at: now,
            updated_at: now,
        };

        let mut rows = Vec::with_capacity(batch.items.len());
        for item in batch.items {
            inner.next_item_id += 1;
            rows.push(PayoutBatchItem {
                id: inner.next_item_id,
                batch_id,
                recipient_user_id: item.recipient_user_id,
                source_record_id: item.source_record_id,
                payout_email: item.payout_email,
                amount: item.amount,
                currency: item.currency,
                note: item.note,
                status: ItemStatus::Pending,
            });
        }

        inner.batches.insert(batch_id, row.clone());
        inner.items.insert(batch_id, rows.clone());
        Ok((row, rows))
    }

    async fn get_batch(&self, batch_id: i64) -> Result<Option<PayoutBatch>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.batches.get(&batch_id).cloned())
    }

    async fn items_for_batch(&self, batch_id: i64) -> Result<Vec<PayoutBatchItem>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.items.get(&batch_id).cloned().unwrap_or_default())
    }

    async fn update_batch(
        &self,
        batch_id: i64,
        status: BatchStatus,
        external_batch_id: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let batch = inner
            .batches
            .get_mut(&batch_id)
            .ok_or(StoreError::BatchNotFound(batch_id))?;
        batch.status = status;
        if external_batch_id.is_some() {
            batch.external_batch_id = external_batch_id;
        }
        batch.updated_at = SystemTime::now();
        Ok(())
    }

    async fn update_item_statuses(
        &self,
        batch_id: i64,
        statuses: &[(i64, ItemStatus)],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let items = inner
            .items
            .get_mut(&batch_id)
            .ok_or(StoreError::BatchNotFound(batch_id))?;
        for (item_id, status) in statuses {
            if let Some(item) = items.iter_mut().find(|i| i.id == *item_id) {
                item.status = *status;
            }
        }
        Ok(())
    }

    async fn mark_rolled_back(&self, batch_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let batch = inner
            .batches
            .get_mut(&batch_id)
            .ok_or(StoreError::BatchNotFound(batch_id))?;
        batch.status = BatchStatus::RolledBack;
        batch.updated_at = SystemTime::now();
        if let Some(items) = inner.items.get_mut(&batch_id) {
            for item in items.iter_mut() {
                if item.status == ItemStatus::Pending {
                    item.status = ItemStatus::RolledBack;
                }
            }
        }
        Ok(())
    }
}
