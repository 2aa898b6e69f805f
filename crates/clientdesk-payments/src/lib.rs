//! # clientdesk-payments
//!
//! Payment records, hosted checkout, and webhook reconciliation for
//! clientdesk.
//!
//! ## Payment collection flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Admin app  │────▶│  Hosted         │────▶│  Frontend   │
//! │  (invoice)  │     │  Checkout Page  │     │  (success)  │
//! └─────────────┘     └────────┬────────┘     └──────┬──────┘
//!                              │ webhook             │ verify
//!                              ▼                     ▼
//!                        ┌──────────────────────────────┐
//!                        │          Reconciler          │
//!                        │  pending/invoiced → received │
//!                        └──────────────────────────────┘
//! ```
//!
//! A payment is created locally (`pending` or `invoiced`), a checkout
//! session is opened with the local payment id riding along as metadata,
//! and completion comes back asynchronously. The webhook is the primary,
//! signature-verified path; the verify-by-session-id call is the fallback
//! for when the payer is redirected back before the webhook lands. Both
//! funnel into one conditional write, so deliveries can be replayed,
//! reordered, or raced without changing the outcome.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clientdesk_payments::{CheckoutService, PaymentsTable, Reconciler, StripeGateway};
//!
//! let payments = PaymentsTable::new(store);
//! let gateway = Arc::new(StripeGateway::from_env()?);
//! let checkout = CheckoutService::new(gateway.clone(), "https://app.example.com");
//! let reconciler = Reconciler::new(payments, gateway, notifier, webhook_secret);
//!
//! let url = checkout.open_checkout("P1", &items).await?;
//! // ... payer completes checkout externally ...
//! reconciler.handle_webhook(&raw_body, &signature_header).await?;
//! ```

mod checkout;
mod error;
mod gateway;
mod notify;
mod record;
mod reconcile;
mod webhook;

pub use checkout::{CheckoutService, LineItem, PAYMENT_METADATA_KEY};
pub use error::{PaymentError, Result};
pub use gateway::{
    CreateSession, HostedSession, MockGateway, PaymentGateway, SessionDetails, SessionItem,
    SessionPaymentStatus, StripeGateway,
};
pub use notify::{LogNotifier, NotificationEvent, Notifier};
pub use reconcile::{Reconciler, VerifyOutcome, WebhookOutcome, VERIFY_FAILED_MESSAGE};
pub use record::{
    NewPayment, PaymentPatch, PaymentRecord, PaymentStatus, PaymentsTable, ReceivedOutcome,
    PAYMENTS_TABLE,
};
pub use webhook::SIGNATURE_HEADER;
