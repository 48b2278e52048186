use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Lifecycle of a persisted payout batch.
///
/// A batch is created as `Intent` before the external network is called,
/// moves to `Submitted`/`Completed`/`Failed` during Phase 2, and reaches
/// `RolledBack` only via the compensator. Rows are never deleted: the ledger
/// is the audit trail of every attempted money movement.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Intent,
    Submitted,
    Completed,
    Failed,
    RolledBack,
}

/// Per-recipient line item status.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Success,
    Failed,
    Unclaimed,
    Processing,
    RolledBack,
}

impl ItemStatus {
    /// Terminal statuses need no further status polling.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemStatus::Pending | ItemStatus::Processing)
    }
}

/// The durable record of one attempted payout transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayoutBatch {
    pub id: i64,
    pub cycle_id: i64,
    /// The admin who triggered this batch.
    pub admin_id: i64,
    /// Idempotency key shared with the external network. At most one
    /// non-rolled-back batch may exist per sender batch id.
    pub sender_batch_id: String,
    /// SHA-256 hex over the normalized request context.
    pub request_checksum: String,
    /// Batch total in cents. Equals the sum of item amounts at creation and
    /// is never altered afterward.
    pub total_amount: i64,
    pub status: BatchStatus,
    pub external_batch_id: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// One ledger line item per recipient.
///
/// Recipient details (email, note, source record) are denormalized onto the
/// item so the audit trail is self-contained and retry-from-failed can
/// rebuild a request without consulting the original award records.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayoutBatchItem {
    pub id: i64,
    pub batch_id: i64,
    pub recipient_user_id: i64,
    pub source_record_id: i64,
    pub payout_email: String,
    /// Amount in cents.
    pub amount: i64,
    pub currency: String,
    pub note: String,
    pub status: ItemStatus,
}
