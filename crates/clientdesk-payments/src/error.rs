//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Payment processor API error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Caller-supplied input was rejected before any external call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Payment record not found
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// Row-store failure
    #[error("Store error: {0}")]
    Store(#[from] clientdesk_store::StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Gateway(_) => true,
            PaymentError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    ///
    /// Store failures are never leaked verbatim; the original error stays in
    /// the server-side logs.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Gateway(msg) => msg.clone(),
            PaymentError::Validation(msg) => msg.clone(),
            PaymentError::PaymentNotFound(_) => "Payment not found.".into(),
            PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
                "Invalid webhook payload.".into()
            }
            PaymentError::Store(_) | PaymentError::Config(_) => {
                "An error occurred processing your request.".into()
            }
        }
    }
}
