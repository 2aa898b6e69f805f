//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use clientdesk_payments::{
    LineItem, NewPayment, NotificationEvent, PaymentError, PaymentPatch, PaymentStatus,
    VerifyOutcome, WebhookOutcome, SIGNATURE_HEADER, VERIFY_FAILED_MESSAGE,
};

use crate::auth::{AuthError, Identity};
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub payments_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub task_id: Option<String>,
    pub client_id: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub task_id: Option<String>,
    pub client_id: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    #[serde(default)]
    pub items: Vec<LineItem>,

    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

type ErrorReply = (StatusCode, Json<ErrorResponse>);

fn error_reply(status: StatusCode, message: impl Into<String>) -> ErrorReply {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Convert a payment-layer failure to an HTTP reply.
///
/// Store failures are logged here and leave the process as a generic 500.
fn payment_error(e: &PaymentError) -> ErrorReply {
    let status = match e {
        PaymentError::Validation(_) => StatusCode::BAD_REQUEST,
        PaymentError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
            StatusCode::BAD_REQUEST
        }
        PaymentError::Gateway(_) | PaymentError::Store(_) | PaymentError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %e, "Request failed");
    }

    error_reply(status, e.user_message())
}

// ============================================================================
// Authentication
// ============================================================================

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, ErrorReply> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            error_reply(
                StatusCode::UNAUTHORIZED,
                "No authorization header provided",
            )
        })?;
    let token = token.strip_prefix("Bearer ").unwrap_or(token);

    state.identity.resolve(token).await.map_err(|e| match e {
        AuthError::InvalidToken => error_reply(StatusCode::UNAUTHORIZED, "Unauthorized"),
        AuthError::Service(err) => {
            tracing::error!(error = %err, "Identity resolution failed");
            error_reply(StatusCode::UNAUTHORIZED, "Invalid token")
        }
    })
}

fn require_admin(identity: &Identity) -> Result<(), ErrorReply> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(error_reply(
            StatusCode::FORBIDDEN,
            "Unauthorized: Admin access required",
        ))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payments_configured: state.reconciler.is_some(),
    })
}

/// List payments; non-admin callers only see their own client's rows
pub async fn list_payments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ErrorReply> {
    let identity = authenticate(&state, &headers).await?;

    let records = if identity.is_admin() {
        state.payments.list(None).await
    } else {
        match identity.client_id.as_deref() {
            Some(client_id) => state.payments.list(Some(client_id)).await,
            // an account with no client scope can match nothing
            None => Ok(Vec::new()),
        }
    }
    .map_err(|e| payment_error(&e))?;

    Ok(Json(records))
}

/// Create a payment (admin only)
pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ErrorReply> {
    let identity = authenticate(&state, &headers).await?;
    require_admin(&identity)?;

    let (Some(task_id), Some(client_id), Some(amount), Some(status), Some(due_date)) = (
        payload.task_id,
        payload.client_id,
        payload.amount,
        payload.status,
        payload.due_date,
    ) else {
        return Err(error_reply(
            StatusCode::BAD_REQUEST,
            "Task ID, client ID, amount, status, and due date are required",
        ));
    };

    let status = PaymentStatus::parse(&status)
        .ok_or_else(|| error_reply(StatusCode::BAD_REQUEST, format!("Invalid status: {status}")))?;

    let record = state
        .payments
        .create(NewPayment {
            task_id,
            client_id,
            amount,
            status,
            due_date,
            invoice_number: payload.invoice_number,
            notes: payload.notes,
        })
        .await
        .map_err(|e| payment_error(&e))?;

    if record.status == PaymentStatus::Invoiced {
        notify_quietly(&state, &record.client_id, NotificationEvent::PaymentInvoiced, &record.id)
            .await;
    }

    Ok((StatusCode::CREATED, Json(record)))
}

/// Edit a payment (admin only)
pub async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdatePaymentRequest>,
) -> Result<impl IntoResponse, ErrorReply> {
    let identity = authenticate(&state, &headers).await?;
    require_admin(&identity)?;

    let status = payload
        .status
        .map(|s| {
            PaymentStatus::parse(&s)
                .ok_or_else(|| error_reply(StatusCode::BAD_REQUEST, format!("Invalid status: {s}")))
        })
        .transpose()?;

    let record = state
        .payments
        .update(
            &id,
            PaymentPatch {
                task_id: payload.task_id,
                client_id: payload.client_id,
                amount: payload.amount,
                status,
                due_date: payload.due_date,
                invoice_number: payload.invoice_number,
                notes: payload.notes,
                received_at: payload.received_at,
            },
        )
        .await
        .map_err(|e| payment_error(&e))?
        .ok_or_else(|| payment_error(&PaymentError::PaymentNotFound(id.clone())))?;

    match record.status {
        PaymentStatus::Invoiced => {
            notify_quietly(&state, &record.client_id, NotificationEvent::PaymentInvoiced, &record.id)
                .await;
        }
        PaymentStatus::Received => {
            notify_quietly(&state, &record.client_id, NotificationEvent::PaymentReceived, &record.id)
                .await;
        }
        PaymentStatus::Pending => {}
    }

    Ok(Json(record))
}

/// Delete a payment (admin only)
pub async fn delete_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ErrorReply> {
    let identity = authenticate(&state, &headers).await?;
    require_admin(&identity)?;

    state
        .payments
        .remove(&id)
        .await
        .map_err(|e| payment_error(&e))?;

    Ok(Json(MessageResponse {
        message: "Payment deleted successfully".into(),
    }))
}

/// Open a hosted checkout session for a payment
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, ErrorReply> {
    authenticate(&state, &headers).await?;

    let checkout = state.checkout.as_ref().ok_or_else(|| {
        error_reply(StatusCode::SERVICE_UNAVAILABLE, "Payments not configured")
    })?;

    let payment_id = payload
        .payment_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            error_reply(StatusCode::BAD_REQUEST, "Items and payment ID are required")
        })?;
    if payload.items.is_empty() {
        return Err(error_reply(
            StatusCode::BAD_REQUEST,
            "Items and payment ID are required",
        ));
    }

    let url = checkout
        .open_checkout(&payment_id, &payload.items)
        .await
        .map_err(|e| payment_error(&e))?;

    Ok(Json(CheckoutResponse { url }))
}

/// Confirm a payment by asking the processor for the session
pub async fn verify_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<VerifyRequest>,
) -> Result<Response, ErrorReply> {
    authenticate(&state, &headers).await?;

    let reconciler = state.reconciler.as_ref().ok_or_else(|| {
        error_reply(StatusCode::SERVICE_UNAVAILABLE, "Payments not configured")
    })?;

    let Some(session_id) = payload.session_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(verify_failure(StatusCode::BAD_REQUEST, "Session ID is required"));
    };

    match reconciler.verify_session(&session_id).await {
        Ok(VerifyOutcome::Confirmed(_)) => Ok(Json(VerifyResponse {
            success: true,
            message: None,
        })
        .into_response()),
        Ok(VerifyOutcome::NotCompleted) => {
            Ok(verify_failure(StatusCode::BAD_REQUEST, VERIFY_FAILED_MESSAGE))
        }
        Err(PaymentError::Validation(message)) => {
            Ok(verify_failure(StatusCode::BAD_REQUEST, &message))
        }
        Err(e) => Err(payment_error(&e)),
    }
}

fn verify_failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(VerifyResponse {
            success: false,
            message: Some(message.to_string()),
        }),
    )
        .into_response()
}

/// Processor webhook endpoint.
///
/// The body arrives as raw bytes on purpose: the signature is computed over
/// the exact payload, so nothing may parse it first.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(reconciler) = state.reconciler.as_ref() else {
        return error_reply(StatusCode::SERVICE_UNAVAILABLE, "Payments not configured")
            .into_response();
    };

    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return (
            StatusCode::BAD_REQUEST,
            "Webhook Error: missing signature header".to_string(),
        )
            .into_response();
    };

    match reconciler.handle_webhook(&body, signature).await {
        Ok(outcome) => {
            if let WebhookOutcome::Ignored { ref reason } = outcome {
                tracing::debug!(reason = %reason, "Webhook acknowledged without action");
            }
            Json(WebhookAck { received: true }).into_response()
        }
        Err(PaymentError::WebhookSignature(message)) => {
            tracing::warn!(error = %message, "Webhook signature failed");
            (StatusCode::BAD_REQUEST, format!("Webhook Error: {message}")).into_response()
        }
        Err(e) => {
            // non-2xx so the processor redelivers once the store recovers
            payment_error(&e).into_response()
        }
    }
}

async fn notify_quietly(
    state: &AppState,
    client_id: &str,
    event: NotificationEvent,
    payment_id: &str,
) {
    let result = state
        .notifier
        .notify(client_id, event, json!({ "paymentId": payment_id }))
        .await;

    if let Err(e) = result {
        tracing::warn!(payment_id = %payment_id, error = %e, "Notification failed");
    }
}
