//! Mock Payment Gateway
//!
//! For testing and demo purposes. Sessions are seeded by the caller and
//! every create request is recorded for assertions.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{CreateSession, HostedSession, PaymentGateway, SessionDetails};
use crate::error::{PaymentError, Result};

/// Mock gateway with seeded sessions
#[derive(Default)]
pub struct MockGateway {
    sessions: RwLock<HashMap<String, SessionDetails>>,
    requests: RwLock<Vec<CreateSession>>,
    counter: AtomicU64,
    create_failure: Option<String>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose `create_session` always fails with this message
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            create_failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Seed a session for `retrieve_session` to find
    pub fn insert_session(&self, details: SessionDetails) {
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(details.id.clone(), details);
    }

    /// All create requests seen so far
    pub fn created_requests(&self) -> Vec<CreateSession> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, request: CreateSession) -> Result<HostedSession> {
        if let Some(ref message) = self.create_failure {
            return Err(PaymentError::Gateway(message.clone()));
        }

        self.requests.write().unwrap().push(request);

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("cs_test_{n}");
        Ok(HostedSession {
            url: format!("https://checkout.example.com/pay/{id}"),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails> {
        let sessions = self.sessions.read().unwrap();
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::Gateway(format!("No such session: {session_id}")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SessionPaymentStatus;

    #[tokio::test]
    async fn test_create_records_request() {
        let gateway = MockGateway::new();
        let request = CreateSession {
            items: vec![],
            metadata: HashMap::new(),
            success_url: "https://app.example.com/ok".into(),
            cancel_url: "https://app.example.com/no".into(),
        };

        let session = gateway.create_session(request.clone()).await.unwrap();
        assert!(session.url.contains(&session.id));
        assert_eq!(gateway.created_requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_retrieve_unknown_session_fails() {
        let gateway = MockGateway::new();
        assert!(gateway.retrieve_session("cs_missing").await.is_err());
    }

    #[tokio::test]
    async fn test_retrieve_seeded_session() {
        let gateway = MockGateway::new();
        gateway.insert_session(SessionDetails {
            id: "cs_1".into(),
            payment_status: SessionPaymentStatus::Paid,
            transaction_id: Some("pi_1".into()),
            metadata: HashMap::new(),
        });

        let details = gateway.retrieve_session("cs_1").await.unwrap();
        assert_eq!(details.payment_status, SessionPaymentStatus::Paid);
    }
}
