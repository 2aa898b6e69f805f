//! Payment Reconciliation
//!
//! The state machine that moves a payment from awaiting-payment to
//! `received` exactly once, driven from two directions:
//!
//! ```text
//!              ┌────────────────────┐  webhook (signed, push)
//!  processor ──┤                    ├──────────────┐
//!              │  hosted checkout   │              ▼
//!  payer ──────┤                    │      ┌──────────────┐     ┌──────────┐
//!              └────────────────────┘      │  Reconciler  │────▶│ payments │
//!  frontend ── verify by session id ──────▶│              │     │  table   │
//!              (pull, after redirect)      └──────────────┘     └──────────┘
//! ```
//!
//! Both paths apply the same conditional transition, so replays and races
//! between them collapse into one observable outcome.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::checkout::PAYMENT_METADATA_KEY;
use crate::error::Result;
use crate::gateway::{PaymentGateway, SessionPaymentStatus};
use crate::notify::{NotificationEvent, Notifier};
use crate::record::{PaymentRecord, PaymentsTable, ReceivedOutcome};
use crate::webhook;

/// Response text for a verify call whose preconditions fail
pub const VERIFY_FAILED_MESSAGE: &str = "Payment not completed or metadata missing.";

/// What a webhook delivery amounted to
#[derive(Clone, Debug)]
pub enum WebhookOutcome {
    /// This delivery applied the transition
    Reconciled(PaymentRecord),

    /// The payment was already reconciled; delivery was a replay
    AlreadyReconciled(PaymentRecord),

    /// Acknowledged without acting (wrong kind, missing fields, ...)
    Ignored { reason: String },
}

/// What a verify-by-session call amounted to
#[derive(Clone, Debug)]
pub enum VerifyOutcome {
    /// The session is paid and the payment record is reconciled
    Confirmed(PaymentRecord),

    /// Session not paid, or required fields missing; nothing changed
    NotCompleted,
}

/// Applies the awaiting-payment → received transition
pub struct Reconciler {
    payments: PaymentsTable,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    webhook_secret: String,
}

impl Reconciler {
    pub fn new(
        payments: PaymentsTable,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            payments,
            gateway,
            notifier,
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Process a signed webhook delivery.
    ///
    /// Signature failure is the only error that must bubble as a client
    /// error before anything else happens; once the signature checks out
    /// every delivery is acknowledged, acted on or not, so the processor's
    /// retry loop winds down.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome> {
        webhook::verify_signature(payload, signature_header, &self.webhook_secret)?;

        let event = match webhook::parse_event(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unparseable webhook delivery");
                return Ok(WebhookOutcome::Ignored {
                    reason: "unparseable payload".into(),
                });
            }
        };

        if event.kind != webhook::CHECKOUT_SESSION_COMPLETED {
            tracing::debug!(event_id = %event.id, kind = %event.kind, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored { reason: event.kind });
        }

        let object = event.data.object;
        let payment_id = object
            .metadata
            .as_ref()
            .and_then(|m| m.get(PAYMENT_METADATA_KEY))
            .cloned();

        let (Some(payment_id), Some(transaction_id)) = (payment_id, object.payment_intent) else {
            tracing::warn!(
                event_id = %event.id,
                session_id = ?object.id,
                "Completed checkout event without payment id or transaction reference"
            );
            return Ok(WebhookOutcome::Ignored {
                reason: "missing payment id or transaction reference".into(),
            });
        };

        self.apply_received(&payment_id, &transaction_id).await
    }

    /// Reconcile by asking the processor for the session directly.
    ///
    /// Fallback for when the payer is redirected back before the webhook
    /// lands. No signature is involved; trust comes from re-querying the
    /// processor rather than believing the caller.
    pub async fn verify_session(&self, session_id: &str) -> Result<VerifyOutcome> {
        let details = self.gateway.retrieve_session(session_id).await?;

        let payment_id = details.metadata.get(PAYMENT_METADATA_KEY).cloned();
        let (Some(payment_id), Some(transaction_id)) = (payment_id, details.transaction_id) else {
            tracing::warn!(session_id = %session_id, "Session is missing reconciliation metadata");
            return Ok(VerifyOutcome::NotCompleted);
        };

        if details.payment_status != SessionPaymentStatus::Paid {
            tracing::info!(
                session_id = %session_id,
                status = ?details.payment_status,
                "Session not paid yet"
            );
            return Ok(VerifyOutcome::NotCompleted);
        }

        match self.apply_received(&payment_id, &transaction_id).await? {
            WebhookOutcome::Reconciled(record) | WebhookOutcome::AlreadyReconciled(record) => {
                Ok(VerifyOutcome::Confirmed(record))
            }
            WebhookOutcome::Ignored { .. } => Ok(VerifyOutcome::NotCompleted),
        }
    }

    /// Apply the transition once; replays and conflicts land in the
    /// already-reconciled branch.
    async fn apply_received(
        &self,
        payment_id: &str,
        transaction_id: &str,
    ) -> Result<WebhookOutcome> {
        match self
            .payments
            .mark_received(payment_id, transaction_id, Utc::now())
            .await?
        {
            ReceivedOutcome::Applied(record) => {
                tracing::info!(
                    payment_id = %record.id,
                    transaction_id = %transaction_id,
                    "Payment reconciled"
                );
                self.notify_received(&record).await;
                Ok(WebhookOutcome::Reconciled(record))
            }
            ReceivedOutcome::AlreadyReceived(record) => {
                if record.transaction_id.as_deref() != Some(transaction_id) {
                    // first event wins; a later reference never overwrites
                    tracing::warn!(
                        payment_id = %record.id,
                        stored = ?record.transaction_id,
                        offered = %transaction_id,
                        "Conflicting transaction references for reconciled payment"
                    );
                }
                Ok(WebhookOutcome::AlreadyReconciled(record))
            }
            ReceivedOutcome::NotFound => {
                tracing::warn!(payment_id = %payment_id, "Completion event for unknown payment");
                Ok(WebhookOutcome::Ignored {
                    reason: format!("unknown payment {payment_id}"),
                })
            }
        }
    }

    async fn notify_received(&self, record: &PaymentRecord) {
        let result = self
            .notifier
            .notify(
                &record.client_id,
                NotificationEvent::PaymentReceived,
                json!({ "paymentId": record.id }),
            )
            .await;

        if let Err(e) = result {
            tracing::warn!(payment_id = %record.id, error = %e, "Notification failed");
        }
    }
}
