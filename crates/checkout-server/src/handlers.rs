//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

use checkout_core::{
    Attempt, Cart, CartItem, CartSnapshot, CheckoutError, CheckoutForm, CheckoutState, Currency,
    PaymentMethodToken, Region, period,
};

use crate::state::{AppState, Session};

/// Header identifying the visitor's session
pub const SESSION_HEADER: &str = "x-session-id";

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub intent_backend: String,
    pub webhooks_configured: bool,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,

    /// Submitting again is safe
    pub retryable: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            retryable: false,
            payment_intent_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MonthsQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CartUpdate {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    #[serde(flatten)]
    pub form: CheckoutForm,

    /// Card token from the hosted payment fields
    pub payment_method: String,

    /// Use the shipping address for billing
    #[serde(default)]
    pub billing_same_as_shipping: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub order_tracking_number: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: Currency,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: CheckoutState,
    pub busy: bool,
    pub orders_placed: u64,
}

// ============================================================================
// Helpers
// ============================================================================

fn session_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= 128)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing or invalid session id", "MISSING_SESSION")),
            )
        })
}

/// Session for a request that changes state; created on first use
fn session(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
    Ok(state.sessions.get_or_create(session_id(headers)?))
}

/// Session for a read; unknown ids are not registered
fn existing_session(state: &AppState, headers: &HeaderMap) -> Result<Option<Session>, ApiError> {
    Ok(state.sessions.get(session_id(headers)?))
}

fn checkout_error(err: &CheckoutError) -> ApiError {
    let status = match err {
        CheckoutError::Busy => StatusCode::CONFLICT,
        CheckoutError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::PaymentConfirmation(_) => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::PaymentIntent(_)
        | CheckoutError::PaymentStatusUnknown { .. }
        | CheckoutError::OrderPlacement { .. }
        | CheckoutError::Backend(_) => StatusCode::BAD_GATEWAY,
        CheckoutError::Cart(_) | CheckoutError::Ledger(_) | CheckoutError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: err.code().into(),
            retryable: err.is_retryable(),
            payment_intent_id: err.payment_intent_id().map(str::to_string),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        intent_backend: state.sessions.intent_backend(),
        webhooks_configured: state.webhooks.is_some(),
        sessions: state.sessions.len(),
    })
}

/// Countries for the address selects
pub async fn list_countries(State(state): State<AppState>) -> Json<Vec<Region>> {
    Json(state.directory.countries())
}

/// States of a country; empty for unknown codes
pub async fn list_states(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Json<Vec<Region>> {
    Json(state.directory.states(&code))
}

/// Card expiration years
pub async fn card_years() -> Json<Vec<i32>> {
    Json(period::expiration_years_now())
}

/// Card expiration months for the selected year (current year if omitted)
pub async fn card_months(Query(query): Query<MonthsQuery>) -> Json<Vec<u32>> {
    Json(query.year.map_or_else(
        period::expiration_months_now,
        period::expiration_months_for,
    ))
}

/// Session cart; empty for a session that never stored one
pub async fn get_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CartSnapshot>, ApiError> {
    let Some(session) = existing_session(&state, &headers)? else {
        return Ok(Json(CartSnapshot::default()));
    };
    let snapshot = session
        .cart
        .snapshot()
        .await
        .map_err(|e| checkout_error(&e))?;
    Ok(Json(snapshot))
}

/// Replace the session cart's items
pub async fn put_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CartUpdate>,
) -> Result<Json<CartSnapshot>, ApiError> {
    let session = session(&state, &headers)?;

    if session.orchestrator.is_busy() {
        return Err(checkout_error(&CheckoutError::Busy));
    }

    if let Some(item) = payload
        .items
        .iter()
        .find(|i| i.quantity == 0 || i.unit_price.is_sign_negative())
    {
        return Err(checkout_error(&CheckoutError::Validation(format!(
            "invalid quantity or price for product {}",
            item.product_id
        ))));
    }

    session.cart.replace(payload.items);
    let snapshot = session
        .cart
        .snapshot()
        .await
        .map_err(|e| checkout_error(&e))?;
    Ok(Json(snapshot))
}

/// Checkout state for the session
pub async fn checkout_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    let Some(session) = existing_session(&state, &headers)? else {
        return Ok(Json(StatusResponse {
            state: CheckoutState::Idle,
            busy: false,
            orders_placed: 0,
        }));
    };
    let orchestrator = &session.orchestrator;

    Ok(Json(StatusResponse {
        state: orchestrator.state(),
        busy: orchestrator.is_busy(),
        orders_placed: orchestrator.generation(),
    }))
}

/// Place the order
///
/// Runs on its own task so a dropped connection cannot abort a flow that
/// has already charged the card.
pub async fn purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let session_id = session_id(&headers)?.to_string();
    let session = state.sessions.get_or_create(&session_id);

    let PurchaseRequest {
        mut form,
        payment_method,
        billing_same_as_shipping,
    } = payload;

    if billing_same_as_shipping {
        form.copy_shipping_to_billing();
    }

    let orchestrator = session.orchestrator.clone();
    let task = tokio::spawn(async move {
        orchestrator
            .checkout(&form, PaymentMethodToken::new(payment_method))
            .await
    });

    let result = task.await.map_err(|e| {
        tracing::error!(session_id = %session_id, error = %e, "Checkout task failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("An unexpected error occurred.", "INTERNAL_ERROR")),
        )
    })?;

    match result {
        Ok(receipt) => Ok(Json(PurchaseResponse {
            order_tracking_number: receipt.tracking_number,
            payment_intent_id: receipt.payment_intent_id,
            amount: receipt.amount,
            currency: receipt.currency,
        })),
        Err(e) => {
            if e.requires_reconciliation() {
                tracing::error!(session_id = %session_id, error = %e, "Checkout needs reconciliation");
            } else {
                tracing::info!(session_id = %session_id, code = e.code(), "Checkout not completed");
            }
            Err(checkout_error(&e))
        }
    }
}

/// Attempts where money moved without an order
pub async fn reconciliation(
    State(state): State<AppState>,
) -> Result<Json<Vec<Attempt>>, ApiError> {
    let attempts = state
        .ledger
        .needs_reconciliation()
        .map_err(|e| checkout_error(&e))?;
    Ok(Json(attempts))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    let reconciler = state.webhooks.as_ref().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Webhooks not configured", "WEBHOOKS_DISABLED")),
        )
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing Stripe signature", "MISSING_SIGNATURE")),
            )
        })?;

    reconciler.handle(&body, signature).map_err(|e| {
        use checkout_payments::PaymentError;

        if matches!(e, PaymentError::WebhookSignature(_)) {
            tracing::warn!("Webhook signature failed: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Invalid signature", "INVALID_SIGNATURE")),
            )
        } else {
            tracing::error!("Webhook processing error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.user_message(), "WEBHOOK_ERROR")),
            )
        }
    })?;

    Ok(StatusCode::OK)
}
