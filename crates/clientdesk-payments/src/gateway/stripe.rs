//! Stripe Gateway
//!
//! `PaymentGateway` implementation over Stripe's hosted checkout.

use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency,
};

use async_trait::async_trait;

use super::{
    CreateSession, HostedSession, PaymentGateway, SessionDetails, SessionPaymentStatus,
};
use crate::error::{PaymentError, Result};

/// Stripe client wrapper
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;

        Ok(Self::new(&secret_key))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(&self, request: CreateSession) -> Result<HostedSession> {
        let line_items = request
            .items
            .iter()
            .map(|item| CreateCheckoutSessionLineItems {
                quantity: Some(item.quantity),
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: Currency::USD,
                    unit_amount: Some(item.unit_amount),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: item.name.clone(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect();

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.metadata = Some(request.metadata.clone());
        params.line_items = Some(line_items);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Gateway("No checkout URL returned".into()))?;

        Ok(HostedSession {
            id: session.id.to_string(),
            url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|_| PaymentError::Validation(format!("Invalid session id: {session_id}")))?;

        let session = CheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let payment_status = match session.payment_status {
            CheckoutSessionPaymentStatus::Paid => SessionPaymentStatus::Paid,
            CheckoutSessionPaymentStatus::Unpaid => SessionPaymentStatus::Unpaid,
            CheckoutSessionPaymentStatus::NoPaymentRequired => {
                SessionPaymentStatus::NoPaymentRequired
            }
        };

        Ok(SessionDetails {
            id: session.id.to_string(),
            payment_status,
            transaction_id: session.payment_intent.as_ref().map(|pi| pi.id().to_string()),
            metadata: session.metadata.unwrap_or_default(),
        })
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
