use crate::domain::context::PayoutRecipient;
use crate::domain::ports::{PayoutGateway, PayoutItemStatus, PayoutSubmission};
use crate::error::GatewayError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

enum Script {
    /// Every item succeeds.
    Succeed,
    /// Every submission fails before anything is confirmed.
    Fail(String),
    /// First `n` submissions fail, then everything succeeds.
    FailFirst(usize),
    /// Fixed per-item outcomes, returned verbatim (a deliberate length
    /// mismatch simulates a malformed response).
    Outcomes(Vec<PayoutItemStatus>),
}

/// A scripted stand-in for the external payout network.
///
/// Used by the CLI for dry runs and by tests as the constructor-injected
/// fake. Honors the network's idempotency contract only as far as the tests
/// need: it answers every submission according to its script.
pub struct SimulatedGateway {
    script: Script,
    delay: Option<Duration>,
    submissions: AtomicUsize,
}

impl SimulatedGateway {
    pub fn succeeding() -> Self {
        Self::with_script(Script::Succeed)
    }

    pub fn failing(reason: &str) -> Self {
        Self::with_script(Script::Fail(reason.to_string()))
    }

    pub fn failing_first(failures: usize) -> Self {
        Self::with_script(Script::FailFirst(failures))
    }

    pub fn with_outcomes(outcomes: Vec<PayoutItemStatus>) -> Self {
        Self::with_script(Script::Outcomes(outcomes))
    }

    /// Delay every submission, for deadline and concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many submissions reached the network.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay: None,
            submissions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PayoutGateway for SimulatedGateway {
    async fn submit_payout(
        &self,
        sender_batch_id: &str,
        recipients: &[PayoutRecipient],
    ) -> Result<PayoutSubmission, GatewayError> {
        let call = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(call, sender_batch_id, recipients = recipients.len(), "simulated submission");

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let all_success = |n: usize| vec![PayoutItemStatus::Success; n];
        let item_outcomes = match &self.script {
            Script::Succeed => all_success(recipients.len()),
            Script::Fail(reason) => return Err(GatewayError::Submission(reason.clone())),
            Script::FailFirst(failures) if call <= *failures => {
                return Err(GatewayError::Submission(format!(
                    "simulated outage ({call}/{failures})"
                )));
            }
            Script::FailFirst(_) => all_success(recipients.len()),
            Script::Outcomes(outcomes) => outcomes.clone(),
        };

        Ok(PayoutSubmission {
            external_batch_id: format!("EXT-{sender_batch_id}"),
            item_outcomes,
        })
    }
}
