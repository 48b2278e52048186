use crate::application::orchestrator::{Orchestrator, TransactionResult};
use crate::domain::batch::BatchStatus;
use crate::domain::context::{RawRecipient, RawTransactionRequest, limits};
use crate::domain::batch::ItemStatus;
use crate::domain::ports::BatchStoreRef;
use crate::error::{StatusError, StoreError};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// External networks page large batches; progress is reported in chunks of
/// this many items.
pub const ITEMS_PER_CHUNK: usize = 500;

/// Progress snapshot for one batch, derived entirely from item statuses.
#[derive(Debug, Serialize)]
pub struct BatchStatusReport {
    pub status: BatchStatus,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub processed_items: usize,
    pub total_items: usize,
    pub external_batch_id: Option<String>,
    pub error: Option<String>,
}

/// Read-side surface over the payout ledger: progress queries and
/// retry-from-failed, both consumed by the admin batch-status endpoints.
pub struct BatchStatusService {
    store: BatchStoreRef,
}

impl BatchStatusService {
    pub fn new(store: BatchStoreRef) -> Self {
        Self { store }
    }

    /// Progress for one batch. An item counts as processed once it has
    /// reached a terminal status; the batch reads as completed once every
    /// item has.
    pub async fn status(&self, batch_id: i64) -> Result<BatchStatusReport, StatusError> {
        let batch = self
            .store
            .get_batch(batch_id)
            .await?
            .ok_or(StoreError::BatchNotFound(batch_id))?;
        let items = self.store.items_for_batch(batch_id).await?;

        let total_items = items.len();
        let processed_items = items.iter().filter(|i| i.status.is_terminal()).count();
        let total_chunks = total_items.div_ceil(ITEMS_PER_CHUNK);
        let completed_chunks = if processed_items == total_items {
            total_chunks
        } else {
            processed_items / ITEMS_PER_CHUNK
        };

        let status = match batch.status {
            // A submitted batch whose last processing item has since settled
            // reads as completed even before the poller updates the row.
            BatchStatus::Submitted if processed_items == total_items => BatchStatus::Completed,
            other => other,
        };

        let error = match batch.status {
            BatchStatus::Failed => {
                Some("compensation incomplete; manual reconciliation required".to_string())
            }
            _ => None,
        };

        Ok(BatchStatusReport {
            status,
            total_chunks,
            completed_chunks,
            processed_items,
            total_items,
            external_batch_id: batch.external_batch_id,
            error,
        })
    }

    /// Build a fresh payout request carrying only the previously failed
    /// items of `batch_id`, under a new sender batch id.
    pub async fn build_retry_request(
        &self,
        batch_id: i64,
    ) -> Result<RawTransactionRequest, StatusError> {
        let batch = self
            .store
            .get_batch(batch_id)
            .await?
            .ok_or(StoreError::BatchNotFound(batch_id))?;
        let items = self.store.items_for_batch(batch_id).await?;

        let failed: Vec<RawRecipient> = items
            .iter()
            .filter(|item| item.status == ItemStatus::Failed)
            .map(|item| RawRecipient {
                source_record_id: Some(item.source_record_id),
                user_id: Some(item.recipient_user_id),
                payout_email: Some(item.payout_email.clone()),
                amount: Some(item.amount),
                currency: Some(item.currency.clone()),
                note: Some(item.note.clone()),
            })
            .collect();

        if failed.is_empty() {
            return Err(StatusError::NoFailedItems(batch_id));
        }

        let total_amount: i64 = failed.iter().filter_map(|r| r.amount).sum();
        let sender_batch_id = retry_sender_batch_id(&batch.sender_batch_id);
        info!(
            batch_id,
            retried_items = failed.len(),
            new_sender_batch_id = %sender_batch_id,
            "building retry request for failed items"
        );

        Ok(RawTransactionRequest {
            cycle_id: Some(batch.cycle_id),
            admin_id: Some(batch.admin_id),
            recipients: Some(failed),
            total_amount: Some(total_amount),
            request_id: Some(format!("retry of batch {batch_id}")),
            sender_batch_id: Some(sender_batch_id),
        })
    }

    /// Retry the failed items of a batch through the full orchestration
    /// pipeline (validation, breaker, limiter, two phases).
    pub async fn retry_failed(
        &self,
        orchestrator: &Orchestrator,
        batch_id: i64,
    ) -> Result<TransactionResult, StatusError> {
        let request = self.build_retry_request(batch_id).await?;
        Ok(orchestrator.execute_transaction(&request).await)
    }
}

/// Derive a fresh idempotency key for a retry, unique per second and bounded
/// by the external network's identifier limit.
fn retry_sender_batch_id(original: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let suffix = format!("-r{secs}");
    // The network limit is in bytes; cut at a char boundary within it.
    let budget = limits::MAX_SENDER_BATCH_ID_LEN - suffix.len();
    let mut end = budget.min(original.len());
    while !original.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{suffix}", &original[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_id_fits_network_limit() {
        let long = "x".repeat(127);
        let id = retry_sender_batch_id(&long);
        assert!(id.len() <= limits::MAX_SENDER_BATCH_ID_LEN);
        assert!(id.contains("-r"));
    }

    #[test]
    fn test_retry_id_multibyte_base_stays_within_byte_limit() {
        // 60 two-byte chars: under the limit in chars, near it in bytes.
        let accented = "é".repeat(60);
        let id = retry_sender_batch_id(&accented);
        assert!(id.len() <= limits::MAX_SENDER_BATCH_ID_LEN);
        assert!(id.contains("-r"));
        // Truncation never splits a char.
        assert!(id.chars().all(|c| c == 'é' || c.is_ascii()));
    }

    #[test]
    fn test_retry_id_keeps_short_base() {
        let id = retry_sender_batch_id("batch-1");
        assert!(id.starts_with("batch-1-r"));
    }
}
