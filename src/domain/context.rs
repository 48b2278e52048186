use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Policy limits for payout requests. These are fixed platform policy, not
/// tunables: the validator rejects anything outside them before any side
/// effect occurs.
pub mod limits {
    /// Upper bound on the admin identifier.
    pub const MAX_ADMIN_ID: i64 = 999_999_999;
    /// Maximum number of recipients in a single batch.
    pub const MAX_RECIPIENTS: usize = 15_000;
    /// Per-recipient payout cap in cents ($60,000).
    pub const MAX_RECIPIENT_AMOUNT: i64 = 6_000_000;
    /// Minimum per-recipient payout in cents.
    pub const MIN_RECIPIENT_AMOUNT: i64 = 1;
    /// Hard safety ceiling on the batch total in cents ($100M).
    pub const MAX_TOTAL_AMOUNT: i64 = 10_000_000_000;
    /// Maximum length of a payout email after trimming.
    pub const MAX_EMAIL_LEN: usize = 254;
    /// Maximum length of the caller-supplied request id.
    pub const MAX_REQUEST_ID_LEN: usize = 500;
    /// The external network's batch-identifier length limit.
    pub const MAX_SENDER_BATCH_ID_LEN: usize = 127;
}

/// An unvalidated payout request as received from the route layer.
///
/// Every field is optional so that missing or out-of-range values surface as
/// accumulated validation errors instead of deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransactionRequest {
    pub cycle_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub recipients: Option<Vec<RawRecipient>>,
    pub total_amount: Option<i64>,
    pub request_id: Option<String>,
    pub sender_batch_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecipient {
    pub source_record_id: Option<i64>,
    pub user_id: Option<i64>,
    pub payout_email: Option<String>,
    /// Payout amount in cents.
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// A single payout destination after sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutRecipient {
    /// Link back to the internal award/selection record.
    pub source_record_id: i64,
    pub user_id: i64,
    /// Lowercased, trimmed, RFC-shaped address.
    pub payout_email: String,
    /// Amount in cents.
    pub amount: i64,
    /// Always `"USD"` after validation.
    pub currency: String,
    /// Free text passed through to the external network.
    pub note: String,
}

/// The validated, immutable input to one orchestration run.
///
/// Constructed only by the validator; downstream stages must use this
/// sanitized copy, never the raw request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    pub cycle_id: i64,
    pub admin_id: i64,
    pub recipients: Vec<PayoutRecipient>,
    /// Batch total in cents, equal to the sum of recipient amounts.
    pub total_amount: i64,
    pub request_id: String,
    pub sender_batch_id: String,
}

impl TransactionContext {
    /// Deterministic SHA-256 checksum over the normalized context, used as
    /// the idempotency fingerprint persisted with the batch.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.cycle_id.to_le_bytes());
        hasher.update(self.admin_id.to_le_bytes());
        hasher.update(self.total_amount.to_le_bytes());
        hasher.update(self.request_id.as_bytes());
        hasher.update(self.sender_batch_id.as_bytes());
        for recipient in &self.recipients {
            hasher.update(recipient.user_id.to_le_bytes());
            hasher.update(recipient.payout_email.as_bytes());
            hasher.update(recipient.amount.to_le_bytes());
        }
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_email(email: &str) -> TransactionContext {
        TransactionContext {
            cycle_id: 1,
            admin_id: 1,
            recipients: vec![PayoutRecipient {
                source_record_id: 1,
                user_id: 10,
                payout_email: email.to_string(),
                amount: 2500,
                currency: "USD".to_string(),
                note: String::new(),
            }],
            total_amount: 2500,
            request_id: "req-1".to_string(),
            sender_batch_id: "batch-1".to_string(),
        }
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let a = context_with_email("a@example.com");
        let b = context_with_email("a@example.com");
        assert_eq!(a.checksum(), b.checksum());
        assert_eq!(a.checksum().len(), 64);
    }

    #[test]
    fn test_checksum_changes_with_recipient() {
        let a = context_with_email("a@example.com");
        let b = context_with_email("b@example.com");
        assert_ne!(a.checksum(), b.checksum());
    }
}
