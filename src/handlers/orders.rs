use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AdminIdentity, Identity};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::order_status::FulfillmentStatus;
use crate::services::orders::OrderResponse;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefundRequestedResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefundProcessedResponse {
    pub success: bool,
    pub refund_ref: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// List the caller's own orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders/mine",
    responses(
        (status = 200, description = "Caller's orders", body = Vec<OrderResponse>),
        (status = 401, description = "Missing identity headers", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<OrderResponse>>, ServiceError> {
    let orders = state.services.orders.list_for_owner(&identity.owner_id).await?;
    Ok(Json(orders))
}

/// List all orders, newest first (admin)
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    responses(
        (status = 200, description = "All orders", body = Vec<OrderResponse>),
        (status = 403, description = "Not the admin", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn admin_list_orders(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
) -> Result<Json<Vec<OrderResponse>>, ServiceError> {
    let orders = state.services.orders.list_all().await?;
    Ok(Json(orders))
}

/// Request a refund on one's own paid order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/request-refund",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Refund requested", body = RefundRequestedResponse),
        (status = 400, description = "Order not refundable", body = crate::errors::ErrorResponse),
        (status = 404, description = "No such order for this owner", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn request_refund(
    State(state): State<AppState>,
    identity: Identity,
    Path(order_id): Path<Uuid>,
) -> Result<Json<RefundRequestedResponse>, ServiceError> {
    state
        .services
        .orders
        .request_refund(order_id, &identity.owner_id)
        .await?;
    Ok(Json(RefundRequestedResponse { success: true }))
}

/// Approve and execute a refund for the full captured amount (admin)
#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{id}/refund",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Refund processed", body = RefundProcessedResponse),
        (status = 400, description = "Order not refundable", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway declined the refund", body = crate::errors::ErrorResponse),
        (status = 504, description = "Gateway call outcome indeterminate", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn admin_refund(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
    Path(order_id): Path<Uuid>,
) -> Result<Json<RefundProcessedResponse>, ServiceError> {
    let order = state.services.orders.approve_refund(order_id).await?;
    let refund_ref = order.refund_ref.unwrap_or_default();
    Ok(Json(RefundProcessedResponse {
        success: true,
        refund_ref,
    }))
}

/// Update an order's fulfillment status (admin)
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Updated order", body = OrderResponse),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "No such order", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn admin_update_status(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<OrderResponse>, ServiceError> {
    let new_status = FulfillmentStatus::from_str(request.status.trim()).map_err(|_| {
        ServiceError::ValidationError(format!("invalid status '{}'", request.status))
    })?;

    state
        .services
        .orders
        .update_fulfillment_status(order_id, new_status)
        .await?;

    let order = state.services.orders.get_with_items(order_id).await?;
    Ok(Json(order))
}

/// Owner-facing order routes
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/mine", get(my_orders))
        .route("/:id/request-refund", post(request_refund))
}

/// Admin order routes
pub fn admin_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_orders))
        .route("/:id/refund", post(admin_refund))
        .route("/:id/status", put(admin_update_status))
}
