//! Hosted Checkout
//!
//! Opens a hosted payment session for a pending payment and hands back the
//! redirect URL. No local state is touched; the session carries the local
//! payment id as metadata so the reconciler can find its way back.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;

use crate::error::{PaymentError, Result};
use crate::gateway::{CreateSession, PaymentGateway, SessionItem};

/// Metadata key under which the local payment id rides on the session
pub const PAYMENT_METADATA_KEY: &str = "paymentId";

/// A cart line as submitted by the caller, priced in currency units
#[derive(Clone, Debug, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub price: Decimal,
    pub quantity: u64,
}

/// Opens hosted checkout sessions
pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    frontend_url: String,
}

impl CheckoutService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, frontend_url: impl Into<String>) -> Self {
        Self {
            gateway,
            frontend_url: frontend_url.into(),
        }
    }

    /// Open a hosted session for the given payment and cart.
    ///
    /// Returns the processor's redirect URL verbatim. Validation failures
    /// are reported before any external call is made.
    pub async fn open_checkout(&self, payment_id: &str, items: &[LineItem]) -> Result<String> {
        if payment_id.trim().is_empty() {
            return Err(PaymentError::Validation("Payment ID is required".into()));
        }
        if items.is_empty() {
            return Err(PaymentError::Validation("Items are required".into()));
        }

        let items = items
            .iter()
            .map(Self::convert_item)
            .collect::<Result<Vec<_>>>()?;

        let mut metadata = HashMap::new();
        metadata.insert(PAYMENT_METADATA_KEY.to_string(), payment_id.to_string());

        let base = self.frontend_url.trim_end_matches('/');
        let session = self
            .gateway
            .create_session(CreateSession {
                items,
                metadata,
                // the session id placeholder is filled in by the processor
                // on redirect, so the frontend can call the verify endpoint
                success_url: format!("{base}/payments/success?session_id={{CHECKOUT_SESSION_ID}}"),
                cancel_url: format!("{base}/payments/cancelled"),
            })
            .await?;

        tracing::info!(
            payment_id = %payment_id,
            session_id = %session.id,
            "Opened checkout session"
        );

        Ok(session.url)
    }

    /// Convert a cart line to the currency's smallest unit
    fn convert_item(item: &LineItem) -> Result<SessionItem> {
        if item.name.trim().is_empty() {
            return Err(PaymentError::Validation("Item name is required".into()));
        }
        if item.quantity == 0 {
            return Err(PaymentError::Validation(format!(
                "Item '{}' must have a positive quantity",
                item.name
            )));
        }
        if item.price <= Decimal::ZERO {
            return Err(PaymentError::Validation(format!(
                "Item '{}' must have a positive price",
                item.name
            )));
        }

        let unit_amount = (item.price * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| {
                PaymentError::Validation(format!("Item '{}' price is out of range", item.name))
            })?;

        Ok(SessionItem {
            name: item.name.clone(),
            unit_amount,
            quantity: item.quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use rust_decimal_macros::dec;

    fn item(name: &str, price: Decimal, quantity: u64) -> LineItem {
        LineItem {
            name: name.into(),
            price,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_open_checkout_returns_url() {
        let gateway = Arc::new(MockGateway::new());
        let service = CheckoutService::new(gateway.clone(), "https://app.example.com");

        let url = service
            .open_checkout("P1", &[item("Service", dec!(100), 1)])
            .await
            .unwrap();
        assert!(url.starts_with("https://checkout.example.com/"));

        let requests = gateway.created_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].metadata.get(PAYMENT_METADATA_KEY).unwrap(),
            "P1"
        );
        assert_eq!(requests[0].items[0].unit_amount, 10_000);
        assert!(requests[0].success_url.contains("{CHECKOUT_SESSION_ID}"));
    }

    #[tokio::test]
    async fn test_empty_items_rejected_before_gateway_call() {
        let gateway = Arc::new(MockGateway::new());
        let service = CheckoutService::new(gateway.clone(), "https://app.example.com");

        let result = service.open_checkout("P1", &[]).await;
        assert!(matches!(result, Err(PaymentError::Validation(_))));
        assert!(gateway.created_requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_payment_id_rejected() {
        let service = CheckoutService::new(Arc::new(MockGateway::new()), "https://app.example.com");
        let result = service
            .open_checkout("  ", &[item("Service", dec!(10), 1)])
            .await;
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_non_positive_price_rejected() {
        let service = CheckoutService::new(Arc::new(MockGateway::new()), "https://app.example.com");
        let result = service
            .open_checkout("P1", &[item("Service", dec!(0), 1)])
            .await;
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let service = CheckoutService::new(Arc::new(MockGateway::new()), "https://app.example.com");
        let result = service
            .open_checkout("P1", &[item("Service", dec!(10), 0)])
            .await;
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fractional_price_converts_to_cents() {
        let gateway = Arc::new(MockGateway::new());
        let service = CheckoutService::new(gateway.clone(), "https://app.example.com/");

        service
            .open_checkout("P1", &[item("Consulting", dec!(49.99), 2)])
            .await
            .unwrap();

        let requests = gateway.created_requests();
        assert_eq!(requests[0].items[0].unit_amount, 4_999);
        assert_eq!(requests[0].items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_gateway_failure_surfaces_message() {
        let service = CheckoutService::new(
            Arc::new(MockGateway::failing("card network down")),
            "https://app.example.com",
        );

        let err = service
            .open_checkout("P1", &[item("Service", dec!(10), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(ref m) if m == "card network down"));
    }
}
