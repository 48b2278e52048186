use crate::domain::context::{
    PayoutRecipient, RawRecipient, RawTransactionRequest, TransactionContext, limits,
};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email pattern")
});

/// Sanitizes and bounds-checks a raw payout request before any side effect
/// occurs. Pure function, no I/O.
///
/// All violations accumulate into the returned error list. On success the
/// caller receives a sanitized [`TransactionContext`] (trimmed, normalized
/// strings) and must use it downstream instead of the raw input.
pub fn validate(raw: &RawTransactionRequest) -> Result<TransactionContext, Vec<String>> {
    let mut errors = Vec::new();

    let cycle_id = match raw.cycle_id {
        Some(id) if id >= 1 => id,
        Some(id) => {
            errors.push(format!("Invalid cycle ID: {id} (must be a positive integer)"));
            0
        }
        None => {
            errors.push("Cycle ID is required".to_string());
            0
        }
    };

    let admin_id = match raw.admin_id {
        Some(id) if (1..=limits::MAX_ADMIN_ID).contains(&id) => id,
        Some(id) => {
            errors.push(format!(
                "Invalid admin ID: {id} (must be between 1 and {})",
                limits::MAX_ADMIN_ID
            ));
            0
        }
        None => {
            errors.push("Admin ID is required".to_string());
            0
        }
    };

    let recipients = match raw.recipients.as_deref() {
        None => {
            errors.push("Recipients list is required".to_string());
            Vec::new()
        }
        Some([]) => {
            errors.push("Recipients list cannot be empty".to_string());
            Vec::new()
        }
        Some(list) if list.len() > limits::MAX_RECIPIENTS => {
            errors.push(format!(
                "Too many recipients: {} (maximum {})",
                list.len(),
                limits::MAX_RECIPIENTS
            ));
            Vec::new()
        }
        Some(list) => list
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| validate_recipient(i + 1, raw, &mut errors))
            .collect(),
    };

    let recipient_sum: i64 = recipients.iter().map(|r| r.amount).sum();
    let total_amount = match raw.total_amount {
        Some(total) if total <= 0 => {
            errors.push(format!("Invalid total amount: {total}"));
            0
        }
        Some(total) if total > limits::MAX_TOTAL_AMOUNT => {
            errors.push(format!(
                "Total amount exceeds safety ceiling: {total} (maximum {})",
                limits::MAX_TOTAL_AMOUNT
            ));
            0
        }
        Some(total) => {
            // Only meaningful once every recipient validated cleanly.
            if errors.is_empty() && total != recipient_sum {
                errors.push(format!(
                    "Total amount mismatch: recipients sum to {recipient_sum}, request says {total}"
                ));
            }
            total
        }
        None => {
            errors.push("Total amount is required".to_string());
            0
        }
    };

    let request_id = raw.request_id.as_deref().unwrap_or("").trim().to_string();
    if request_id.is_empty() {
        errors.push("Request ID is required".to_string());
    } else if request_id.len() > limits::MAX_REQUEST_ID_LEN {
        errors.push(format!(
            "Request ID too long: {} characters (maximum {})",
            request_id.len(),
            limits::MAX_REQUEST_ID_LEN
        ));
    }

    let sender_batch_id = raw
        .sender_batch_id
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string();
    if sender_batch_id.is_empty() {
        errors.push("Sender batch ID is required".to_string());
    } else if sender_batch_id.len() > limits::MAX_SENDER_BATCH_ID_LEN {
        errors.push(format!(
            "Sender batch ID too long: {} characters (maximum {})",
            sender_batch_id.len(),
            limits::MAX_SENDER_BATCH_ID_LEN
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(TransactionContext {
        cycle_id,
        admin_id,
        recipients,
        total_amount,
        request_id,
        sender_batch_id,
    })
}

/// Validates one recipient, accumulating violations into `errors`. Returns
/// the sanitized recipient only when every field passed.
fn validate_recipient(
    position: usize,
    raw: &RawRecipient,
    errors: &mut Vec<String>,
) -> Option<PayoutRecipient> {
    let before = errors.len();

    let payout_email = raw
        .payout_email
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    if payout_email.is_empty() {
        errors.push(format!("Recipient {position}: payout email is required"));
    } else if payout_email.len() > limits::MAX_EMAIL_LEN {
        errors.push(format!(
            "Recipient {position}: payout email too long (maximum {} characters)",
            limits::MAX_EMAIL_LEN
        ));
    } else if !EMAIL_PATTERN.is_match(&payout_email) {
        errors.push(format!(
            "Recipient {position}: invalid payout email '{payout_email}'"
        ));
    }

    let amount = match raw.amount {
        Some(amount) if amount < limits::MIN_RECIPIENT_AMOUNT => {
            errors.push(format!(
                "Recipient {position}: Amount too low: {amount} (minimum {} cent)",
                limits::MIN_RECIPIENT_AMOUNT
            ));
            0
        }
        Some(amount) if amount > limits::MAX_RECIPIENT_AMOUNT => {
            errors.push(format!(
                "Recipient {position}: Amount too high: {amount} (maximum {} cents)",
                limits::MAX_RECIPIENT_AMOUNT
            ));
            0
        }
        Some(amount) => amount,
        None => {
            errors.push(format!("Recipient {position}: amount is required"));
            0
        }
    };

    let currency_raw = raw.currency.as_deref().unwrap_or("").trim();
    let currency = if currency_raw.is_empty() {
        // Absent currency defaults to USD.
        "USD".to_string()
    } else {
        currency_raw.to_uppercase()
    };
    if currency != "USD" {
        errors.push(format!(
            "Recipient {position}: unsupported currency '{currency}' (only USD)"
        ));
    }

    let source_record_id = raw.source_record_id.unwrap_or_else(|| {
        errors.push(format!("Recipient {position}: source record ID is required"));
        0
    });
    let user_id = raw.user_id.unwrap_or_else(|| {
        errors.push(format!("Recipient {position}: user ID is required"));
        0
    });

    if errors.len() > before {
        return None;
    }

    Some(PayoutRecipient {
        source_record_id,
        user_id,
        payout_email,
        amount,
        currency,
        note: raw.note.clone().unwrap_or_default(),
    })
}
