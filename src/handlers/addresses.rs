use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::Identity;
use crate::entities::address::Model as AddressModel;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::addresses::UpsertAddressRequest;
use crate::ApiResponse;

/// List the caller's addresses, default first
#[utoipa::path(
    get,
    path = "/api/v1/addresses/mine",
    responses(
        (status = 200, description = "Caller's addresses", body = crate::ApiResponse<Vec<AddressModel>>),
        (status = 401, description = "Missing identity headers", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn my_addresses(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ApiResponse<Vec<AddressModel>>>, ServiceError> {
    let addresses = state
        .services
        .addresses
        .list_for_owner(&identity.owner_id)
        .await?;
    Ok(Json(ApiResponse::success(addresses)))
}

/// Create an address; setting it default clears the previous default
#[utoipa::path(
    post,
    path = "/api/v1/addresses",
    request_body = UpsertAddressRequest,
    responses(
        (status = 201, description = "Address created", body = crate::ApiResponse<AddressModel>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn create_address(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<UpsertAddressRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AddressModel>>), ServiceError> {
    let address = state
        .services
        .addresses
        .create(&identity.owner_id, &identity.owner_email, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(address))))
}

/// Update one of the caller's addresses
#[utoipa::path(
    put,
    path = "/api/v1/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address ID")),
    request_body = UpsertAddressRequest,
    responses(
        (status = 200, description = "Address updated", body = crate::ApiResponse<AddressModel>),
        (status = 404, description = "No such address for this owner", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn update_address(
    State(state): State<AppState>,
    identity: Identity,
    Path(address_id): Path<Uuid>,
    Json(request): Json<UpsertAddressRequest>,
) -> Result<Json<ApiResponse<AddressModel>>, ServiceError> {
    let address = state
        .services
        .addresses
        .update(address_id, &identity.owner_id, request)
        .await?;
    Ok(Json(ApiResponse::success(address)))
}

/// Delete one of the caller's addresses. Historical orders keep their own
/// snapshot and are unaffected.
#[utoipa::path(
    delete,
    path = "/api/v1/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address ID")),
    responses(
        (status = 204, description = "Address deleted"),
        (status = 404, description = "No such address for this owner", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    identity: Identity,
    Path(address_id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .addresses
        .delete(address_id, &identity.owner_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Address book routes
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/mine", get(my_addresses))
        .route("/", post(create_address))
        .route("/:id", put(update_address))
        .route("/:id", delete(delete_address))
}
