//! Payment Records
//!
//! The `payments` table model and its typed access layer. Payments move
//! through `pending → invoiced → received`; `received_at` and
//! `transaction_id` are only ever set together with the `received` status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use clientdesk_store::{Filter, RowStore};

use crate::error::Result;

/// Table name in the row store
pub const PAYMENTS_TABLE: &str = "payments";

/// Payment lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Invoiced,
    Received,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Invoiced => "invoiced",
            PaymentStatus::Received => "received",
        }
    }

    /// Parse from the wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "invoiced" => Some(PaymentStatus::Invoiced),
            "received" => Some(PaymentStatus::Received),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `payments` table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,

    /// Task this payment bills for
    pub task_id: String,

    /// Client being billed
    pub client_id: String,

    pub amount: Decimal,

    pub status: PaymentStatus,

    pub due_date: DateTime<Utc>,

    #[serde(default)]
    pub invoice_number: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    /// Processor transaction reference; set when the payment is received
    #[serde(default)]
    pub transaction_id: Option<String>,

    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a payment
#[derive(Clone, Debug, Deserialize)]
pub struct NewPayment {
    pub task_id: String,
    pub client_id: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Administrative edit; absent fields are left untouched
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaymentPatch {
    pub task_id: Option<String>,
    pub client_id: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<PaymentStatus>,
    pub due_date: Option<DateTime<Utc>>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Outcome of the conditional received-transition write
#[derive(Clone, Debug)]
pub enum ReceivedOutcome {
    /// The transition was applied by this call
    Applied(PaymentRecord),

    /// The record was already in the terminal state; nothing changed
    AlreadyReceived(PaymentRecord),

    /// No such payment
    NotFound,
}

/// Typed access to the `payments` table
#[derive(Clone)]
pub struct PaymentsTable {
    store: Arc<dyn RowStore>,
}

impl PaymentsTable {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    fn parse_row(row: Value) -> Result<PaymentRecord> {
        serde_json::from_value(row).map_err(|e| clientdesk_store::StoreError::from(e).into())
    }

    /// List payments, optionally scoped to one client
    pub async fn list(&self, client_id: Option<&str>) -> Result<Vec<PaymentRecord>> {
        let filter = match client_id {
            Some(id) => Filter::all().eq("client_id", id),
            None => Filter::all(),
        };

        let rows = self.store.select(PAYMENTS_TABLE, &filter).await?;
        rows.into_iter().map(Self::parse_row).collect()
    }

    /// Fetch one payment by id
    pub async fn get(&self, id: &str) -> Result<Option<PaymentRecord>> {
        let rows = self
            .store
            .select(PAYMENTS_TABLE, &Filter::all().eq("id", id))
            .await?;
        rows.into_iter().next().map(Self::parse_row).transpose()
    }

    /// Insert a new payment, stamping the bookkeeping timestamps
    pub async fn create(&self, new: NewPayment) -> Result<PaymentRecord> {
        let now = Utc::now();
        let row = json!({
            "task_id": new.task_id,
            "client_id": new.client_id,
            "amount": new.amount,
            "status": new.status,
            "due_date": new.due_date,
            "invoice_number": new.invoice_number,
            "notes": new.notes,
            "created_at": now,
            "updated_at": now,
        });

        let stored = self.store.insert(PAYMENTS_TABLE, row).await?;
        Self::parse_row(stored)
    }

    /// Apply an administrative edit.
    ///
    /// Marking a payment `received` without an explicit `received_at` stamps
    /// the current time, keeping the received-fields invariant intact.
    pub async fn update(&self, id: &str, patch: PaymentPatch) -> Result<Option<PaymentRecord>> {
        let now = Utc::now();
        let mut fields = serde_json::Map::new();

        if let Some(task_id) = patch.task_id {
            fields.insert("task_id".into(), json!(task_id));
        }
        if let Some(client_id) = patch.client_id {
            fields.insert("client_id".into(), json!(client_id));
        }
        if let Some(amount) = patch.amount {
            fields.insert("amount".into(), json!(amount));
        }
        if let Some(status) = patch.status {
            fields.insert("status".into(), json!(status));
        }
        if let Some(due_date) = patch.due_date {
            fields.insert("due_date".into(), json!(due_date));
        }
        if let Some(invoice_number) = patch.invoice_number {
            fields.insert("invoice_number".into(), json!(invoice_number));
        }
        if let Some(notes) = patch.notes {
            fields.insert("notes".into(), json!(notes));
        }
        match (patch.status, patch.received_at) {
            (_, Some(at)) => {
                fields.insert("received_at".into(), json!(at));
            }
            (Some(PaymentStatus::Received), None) => {
                fields.insert("received_at".into(), json!(now));
            }
            _ => {}
        }
        fields.insert("updated_at".into(), json!(now));

        let updated = self
            .store
            .update(
                PAYMENTS_TABLE,
                &Filter::all().eq("id", id),
                Value::Object(fields),
            )
            .await?;

        updated.into_iter().next().map(Self::parse_row).transpose()
    }

    /// Physically delete a payment
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store
            .delete(PAYMENTS_TABLE, &Filter::all().eq("id", id))
            .await?;
        Ok(())
    }

    /// Transition a payment to `received` exactly once.
    ///
    /// Issued as a single conditional update (`id = ? AND status !=
    /// received`) so that concurrent webhook deliveries commute: whichever
    /// write lands first applies the transition, every later one matches
    /// zero rows.
    pub async fn mark_received(
        &self,
        id: &str,
        transaction_id: &str,
        at: DateTime<Utc>,
    ) -> Result<ReceivedOutcome> {
        let patch = json!({
            "status": PaymentStatus::Received,
            "transaction_id": transaction_id,
            "received_at": at,
            "updated_at": at,
        });

        let filter = Filter::all()
            .eq("id", id)
            .neq("status", PaymentStatus::Received.as_str());

        let updated = self.store.update(PAYMENTS_TABLE, &filter, patch).await?;

        if let Some(row) = updated.into_iter().next() {
            return Ok(ReceivedOutcome::Applied(Self::parse_row(row)?));
        }

        match self.get(id).await? {
            Some(existing) => Ok(ReceivedOutcome::AlreadyReceived(existing)),
            None => Ok(ReceivedOutcome::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clientdesk_store::MemoryStore;
    use rust_decimal_macros::dec;

    fn table() -> PaymentsTable {
        PaymentsTable::new(Arc::new(MemoryStore::new()))
    }

    fn new_payment(client_id: &str) -> NewPayment {
        NewPayment {
            task_id: "t1".into(),
            client_id: client_id.into(),
            amount: dec!(100),
            status: PaymentStatus::Pending,
            due_date: Utc::now(),
            invoice_number: None,
            notes: None,
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Invoiced,
            PaymentStatus::Received,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::parse("paid"), None);
    }

    #[tokio::test]
    async fn test_create_stamps_timestamps() {
        let payments = table();
        let record = payments.create(new_payment("c1")).await.unwrap();

        assert_eq!(record.status, PaymentStatus::Pending);
        assert!(record.received_at.is_none());
        assert!(record.transaction_id.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[tokio::test]
    async fn test_list_scopes_by_client() {
        let payments = table();
        payments.create(new_payment("c1")).await.unwrap();
        payments.create(new_payment("c2")).await.unwrap();

        assert_eq!(payments.list(None).await.unwrap().len(), 2);
        let scoped = payments.list(Some("c1")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].client_id, "c1");
    }

    #[tokio::test]
    async fn test_update_stamps_received_at() {
        let payments = table();
        let record = payments.create(new_payment("c1")).await.unwrap();

        let patch = PaymentPatch {
            status: Some(PaymentStatus::Received),
            ..PaymentPatch::default()
        };
        let updated = payments.update(&record.id, patch).await.unwrap().unwrap();

        assert_eq!(updated.status, PaymentStatus::Received);
        assert!(updated.received_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_received_applies_once() {
        let payments = table();
        let record = payments.create(new_payment("c1")).await.unwrap();
        let now = Utc::now();

        let first = payments
            .mark_received(&record.id, "pi_123", now)
            .await
            .unwrap();
        let applied = match first {
            ReceivedOutcome::Applied(rec) => rec,
            other => panic!("expected Applied, got {other:?}"),
        };
        assert_eq!(applied.status, PaymentStatus::Received);
        assert_eq!(applied.transaction_id.as_deref(), Some("pi_123"));
        assert_eq!(applied.received_at, Some(now));

        // replay keeps the first transaction reference
        let second = payments
            .mark_received(&record.id, "pi_456", Utc::now())
            .await
            .unwrap();
        match second {
            ReceivedOutcome::AlreadyReceived(rec) => {
                assert_eq!(rec.transaction_id.as_deref(), Some("pi_123"));
            }
            other => panic!("expected AlreadyReceived, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mark_received_missing_payment() {
        let payments = table();
        let outcome = payments
            .mark_received("missing", "pi_123", Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, ReceivedOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_remove_deletes_row() {
        let payments = table();
        let record = payments.create(new_payment("c1")).await.unwrap();

        payments.remove(&record.id).await.unwrap();
        assert!(payments.get(&record.id).await.unwrap().is_none());
    }
}
