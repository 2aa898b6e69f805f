//! Client Notifications
//!
//! Fire-and-forget side channel for status-change events. Failures here
//! must never fail the operation that triggered them; callers log and move
//! on.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Events worth telling a client about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationEvent {
    PaymentInvoiced,
    PaymentReceived,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::PaymentInvoiced => "payment_invoiced",
            NotificationEvent::PaymentReceived => "payment_received",
        }
    }
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification sink trait
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Emit an event for an entity (client id, task id, ...)
    async fn notify(&self, entity_id: &str, event: NotificationEvent, payload: Value)
        -> Result<()>;
}

/// Notifier that writes events to the log
///
/// Stands in for the real delivery channel (email, push); swap the
/// implementation without touching callers.
#[derive(Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        entity_id: &str,
        event: NotificationEvent,
        payload: Value,
    ) -> Result<()> {
        tracing::info!(
            entity_id = %entity_id,
            event = %event,
            payload = %payload,
            "Client notification"
        );
        Ok(())
    }
}
