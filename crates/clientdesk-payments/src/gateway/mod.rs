//! Payment Gateway Integration
//!
//! Abstraction over the hosted-checkout processor. The backend only ever
//! needs two calls: open a hosted session, and fetch one back by id.

mod mock;
mod stripe;

pub use mock::MockGateway;
pub use self::stripe::StripeGateway;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// A priced line item, already converted to the currency's smallest unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionItem {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: u64,
}

/// Request to open a hosted checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateSession {
    pub items: Vec<SessionItem>,

    /// Opaque tags echoed back on the session; carries the local payment id
    pub metadata: HashMap<String, String>,

    pub success_url: String,
    pub cancel_url: String,
}

/// A freshly opened hosted session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedSession {
    pub id: String,

    /// Where to redirect the payer
    pub url: String,
}

/// Payment state of a session as reported by the processor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

/// A session fetched back from the processor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionDetails {
    pub id: String,

    pub payment_status: SessionPaymentStatus,

    /// Processor transaction reference, present once payment settled
    pub transaction_id: Option<String>,

    /// Metadata attached at session creation
    pub metadata: HashMap<String, String>,
}

/// Payment gateway trait (Strategy pattern)
///
/// Implement this per processor; the mock implementation backs tests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session
    async fn create_session(&self, request: CreateSession) -> Result<HostedSession>;

    /// Fetch a session by its processor-issued id
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails>;

    /// Gateway name
    fn name(&self) -> &str;
}
