//! Application State

use std::sync::Arc;

use clientdesk_payments::{CheckoutService, Notifier, PaymentsTable, Reconciler};

use crate::auth::IdentityProvider;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Typed access to the payments table
    pub payments: PaymentsTable,

    /// Client notification sink
    pub notifier: Arc<dyn Notifier>,

    /// Bearer token resolution
    pub identity: Arc<dyn IdentityProvider>,

    /// Checkout initiator (None if the processor is not configured)
    pub checkout: Option<Arc<CheckoutService>>,

    /// Payment reconciler (None if the processor is not configured)
    pub reconciler: Option<Arc<Reconciler>>,
}
