//! # Request Handlers
//!
//! Axum request handlers for the checkout API.
//! Domain errors are translated into `ErrorResponse` here and nowhere else.

use crate::auth::{CurrentUser, StaffId};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use checkout_core::{
    CartView, CheckoutError, ExitStatus, ExitVerification, InitiatedPayment, IssuedExitPass,
    Order, OrderDetail, PaymentProvider, PaymentView, SettledOrder,
};
use checkout_razorpay::{normalize_webhook, SIGNATURE_HEADER};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Handler result with a translated error
pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add-to-cart request
#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Payment initiation request
#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub order_id: Uuid,
    #[serde(default = "default_method")]
    pub payment_method: String,
    /// Demo backend only: force a failed outcome
    #[serde(default)]
    pub simulate_failure: bool,
}

fn default_method() -> String {
    "upi".to_string()
}

/// Client-side confirmation from the Razorpay checkout widget
#[derive(Debug, Deserialize)]
pub struct VerifyRazorpayRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Exit pass request
#[derive(Debug, Deserialize)]
pub struct GenerateExitQrRequest {
    pub order_id: Uuid,
}

/// Gate scan request
#[derive(Debug, Deserialize)]
pub struct VerifyExitQrRequest {
    pub qr_token: String,
}

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<checkout_core::SettlementOutcome>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>, status: u16) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            status,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

fn error_response(state: &AppState, err: CheckoutError) -> (StatusCode, Json<ErrorResponse>) {
    let status = err.status_code();
    let message = if err.is_provider_error() && state.config.is_production() {
        "Payment provider error, please retry".to_string()
    } else {
        err.to_string()
    };

    if status >= 500 {
        error!("Request failed: {}", err);
    }

    let mut response = ErrorResponse::new(message, err.error_code(), status);
    if err.is_retryable() {
        response = response.with_details("retryable");
    }
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "smart-checkout",
        "version": env!("CARGO_PKG_VERSION"),
        "payment_mode": state.payments.provider().as_str(),
    }))
}

/// Active products
pub async fn list_products(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let products = state
        .store
        .active_products()
        .await
        .map_err(|e| error_response(&state, e))?;
    Ok(Json(serde_json::json!({
        "count": products.len(),
        "products": products,
    })))
}

#[instrument(skip(state, request), fields(user = %user.0))]
pub async fn add_cart_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<AddCartItemRequest>,
) -> ApiResult<Json<CartView>> {
    state
        .store
        .add_to_cart(user.0, request.product_id, request.quantity)
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

pub async fn get_cart(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<CartView>> {
    state
        .store
        .cart_view(user.0)
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<StatusCode> {
    state
        .store
        .clear_cart(user.0)
        .await
        .map_err(|e| error_response(&state, e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Convert the caller's cart into a pending order
#[instrument(skip(state), fields(user = %user.0))]
pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<(StatusCode, Json<OrderDetail>)> {
    let order = state
        .orders
        .create_order(user.0)
        .await
        .map_err(|e| error_response(&state, e))?;

    info!(
        "Order {} created: total={}",
        order.order.order_number,
        order.order.total.display()
    );
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<Order>>> {
    state
        .orders
        .list_orders(user.0)
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<OrderDetail>> {
    state
        .orders
        .get_order(user.0, order_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

#[instrument(skip(state, request), fields(user = %user.0, order = %request.order_id))]
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<InitiatePaymentRequest>,
) -> ApiResult<Json<InitiatedPayment>> {
    state
        .payments
        .initiate_payment(
            user.0,
            request.order_id,
            &request.payment_method,
            request.simulate_failure,
        )
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

#[instrument(
    skip(state, request),
    fields(user = %user.0, rzp_order = %request.razorpay_order_id)
)]
pub async fn verify_razorpay(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<VerifyRazorpayRequest>,
) -> ApiResult<Json<SettledOrder>> {
    state
        .payments
        .verify_live_payment(
            user.0,
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
        )
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

pub async fn demo_complete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<SettledOrder>> {
    state
        .payments
        .demo_complete(user.0, order_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

pub async fn payment_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(payment_id): Path<Uuid>,
) -> ApiResult<Json<PaymentView>> {
    state
        .payments
        .payment_status(user.0, payment_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

pub async fn reconcile_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(payment_id): Path<Uuid>,
) -> ApiResult<Json<PaymentView>> {
    state
        .payments
        .reconcile(user.0, payment_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

#[instrument(skip(state, request), fields(user = %user.0, order = %request.order_id))]
pub async fn generate_exit_qr(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<GenerateExitQrRequest>,
) -> ApiResult<Json<IssuedExitPass>> {
    state
        .exit_passes
        .issue(user.0, request.order_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&state, e))
}

/// Gate scan; always answers 200 with a structured verdict
#[instrument(skip(state, body), fields(staff = %staff.0))]
pub async fn verify_exit_qr(
    State(state): State<AppState>,
    staff: StaffId,
    body: Bytes,
) -> Json<ExitVerification> {
    let request: VerifyExitQrRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Unreadable scan payload: {}", e);
            return Json(ExitVerification::rejected(
                ExitStatus::Invalid,
                "Invalid QR code",
            ));
        }
    };

    Json(state.exit_passes.verify(&request.qr_token, &staff.0).await)
}

/// Settlement webhook for both the demo backend and Razorpay
#[instrument(skip(state, headers, body))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let accept_demo = state.payments.provider() == PaymentProvider::Demo;
    let event = normalize_webhook(
        &body,
        signature,
        state.webhook_secret.as_deref(),
        accept_demo,
    )
    .map_err(|e| {
        warn!("Webhook rejected: {}", e);
        error_response(&state, e)
    })?;

    let Some(event) = event else {
        return Ok(Json(WebhookAck {
            status: "ignored",
            outcome: None,
        }));
    };

    info!(
        "Webhook: provider={}, order={}, kind={:?}",
        event.provider, event.order_ref, event.kind
    );

    let outcome = state
        .settlement
        .apply(event)
        .await
        .map_err(|e| error_response(&state, e))?;

    Ok(Json(WebhookAck {
        status: "ok",
        outcome: Some(outcome),
    }))
}
