use crate::auth::Identity;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::checkout::{
    to_minor_units, AddressSnapshot, CartLine, PaymentIntent,
};
use crate::gateway::RemoteOrderStatus;
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentOrderRequest {
    /// Client-declared total. Never trusted; the amount is recomputed from
    /// the line items and a discrepancy is logged for investigation.
    pub amount: Option<Decimal>,
    pub items: Vec<CartLine>,
    pub address: AddressSnapshot,
    /// Optional idempotent receipt identifier; reuse it when retrying after
    /// an indeterminate outcome
    pub receipt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub gateway_order_ref: String,
    pub payment_ref: String,
    pub signature: String,
    pub items: Vec<CartLine>,
    pub address: AddressSnapshot,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RemoteOrderStatusResponse {
    pub gateway_order_ref: String,
    pub status: RemoteOrderStatus,
}

/// Create a payment intent at the gateway
#[utoipa::path(
    post,
    path = "/api/v1/payments/create-order",
    request_body = CreatePaymentOrderRequest,
    responses(
        (status = 200, description = "Intent created", body = PaymentIntent),
        (status = 400, description = "Empty or malformed cart", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing identity headers", body = crate::errors::ErrorResponse),
        (status = 504, description = "Gateway call outcome indeterminate", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn create_payment_order(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreatePaymentOrderRequest>,
) -> Result<Json<PaymentIntent>, ServiceError> {
    let intent = state
        .services
        .checkout
        .create_intent(
            &identity.owner_id,
            &identity.owner_email,
            &request.items,
            &request.address,
            request.receipt,
        )
        .await?;

    // Several storefront clients still send their own total; surface any
    // divergence from the recomputed amount instead of silently charging it.
    if let Some(declared) = request.amount {
        if to_minor_units(declared).ok() != Some(intent.amount_minor) {
            warn!(
                declared = %declared,
                recomputed_minor = intent.amount_minor,
                "Client-declared total differs from recomputed amount"
            );
        }
    }

    Ok(Json(intent))
}

/// Confirm a client-side payment capture
#[utoipa::path(
    post,
    path = "/api/v1/payments/confirm",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Order persisted (or already existed for this payment)", body = ConfirmPaymentResponse),
        (status = 400, description = "Signature mismatch or invalid cart", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing identity headers", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<ConfirmPaymentResponse>, ServiceError> {
    let outcome = state
        .services
        .checkout
        .confirm_payment(
            &identity.owner_id,
            &identity.owner_email,
            &request.gateway_order_ref,
            &request.payment_ref,
            &request.signature,
            &request.items,
            &request.address,
        )
        .await?;

    Ok(Json(ConfirmPaymentResponse {
        success: true,
        order_id: outcome.order_id(),
    }))
}

/// Poll the provider's view of an intent. This is the reconciliation path
/// after an indeterminate create-order or confirm outcome.
#[utoipa::path(
    get,
    path = "/api/v1/payments/remote/{gateway_order_ref}",
    params(("gateway_order_ref" = String, Path, description = "Gateway order reference")),
    responses(
        (status = 200, description = "Provider order status", body = RemoteOrderStatusResponse),
        (status = 404, description = "Unknown gateway order", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider unreachable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn remote_order_status(
    State(state): State<AppState>,
    _identity: Identity,
    Path(gateway_order_ref): Path<String>,
) -> Result<Json<RemoteOrderStatusResponse>, ServiceError> {
    let status = state
        .services
        .checkout
        .remote_order_status(&gateway_order_ref)
        .await?;
    Ok(Json(RemoteOrderStatusResponse {
        gateway_order_ref,
        status,
    }))
}

/// Payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_payment_order))
        .route("/confirm", post(confirm_payment))
        .route("/remote/:gateway_order_ref", get(remote_order_status))
}
