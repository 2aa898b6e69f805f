//! clientdesk HTTP Server
//!
//! Axum-based server for the client-management backend: payment lifecycle
//! routes, hosted checkout, and the processor webhook.

mod auth;
mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clientdesk_payments::{CheckoutService, LogNotifier, PaymentsTable, Reconciler, StripeGateway};
use clientdesk_store::{PostgrestConfig, PostgrestStore};

use crate::auth::SupabaseAuth;
use crate::config::ServerConfig;
use crate::handlers::{
    create_checkout_session, create_payment, delete_payment, health_check, list_payments,
    payment_webhook, update_payment, verify_payment,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    // Row store
    let store = Arc::new(PostgrestStore::new(PostgrestConfig {
        base_url: config.supabase_url.clone(),
        service_key: config.supabase_service_key.clone(),
    }));
    let payments = PaymentsTable::new(store);

    // Collaborators
    let notifier = Arc::new(LogNotifier::new());
    let identity = Arc::new(SupabaseAuth::new(
        config.supabase_url.as_str(),
        config.supabase_anon_key.as_str(),
    ));

    // Payment processor (optional - collection routes answer 503 without it)
    let (checkout, reconciler) = match (&config.stripe_secret_key, &config.stripe_webhook_secret) {
        (Some(secret_key), Some(webhook_secret)) => {
            tracing::info!("✓ Stripe configured");
            let gateway = Arc::new(StripeGateway::new(secret_key));
            let checkout = CheckoutService::new(gateway.clone(), config.frontend_url.as_str());
            let reconciler = Reconciler::new(
                payments.clone(),
                gateway,
                notifier.clone(),
                webhook_secret.clone(),
            );
            (Some(Arc::new(checkout)), Some(Arc::new(reconciler)))
        }
        _ => {
            tracing::warn!("⚠ Stripe not configured - payment collection disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            (None, None)
        }
    };

    // Build application state
    let state = AppState {
        payments,
        notifier,
        identity,
        checkout,
        reconciler,
    };

    // CORS configuration: the frontend is the only browser caller
    let cors = CorsLayer::new()
        .allow_origin(config.frontend_url.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        // Health & info
        .route("/health", get(health_check))

        // Payment lifecycle
        .route("/payments", get(list_payments).post(create_payment))
        .route("/payments/{id}", put(update_payment).delete(delete_payment))

        // Payment collection
        .route("/payments/create-checkout-session", post(create_checkout_session))
        .route("/payments/verify", post(verify_payment))
        .route("/payments/webhook", post(payment_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("clientdesk server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                            - Health check");
    tracing::info!("  GET    /payments                          - List payments");
    tracing::info!("  POST   /payments                          - Create payment");
    tracing::info!("  PUT    /payments/{{id}}                     - Update payment");
    tracing::info!("  DELETE /payments/{{id}}                     - Delete payment");
    tracing::info!("  POST   /payments/create-checkout-session  - Open hosted checkout");
    tracing::info!("  POST   /payments/verify                   - Verify by session id");
    tracing::info!("  POST   /payments/webhook                  - Processor webhook");

    axum::serve(listener, app).await?;

    Ok(())
}
