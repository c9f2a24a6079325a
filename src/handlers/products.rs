use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::AdminIdentity;
use crate::entities::product::Model as ProductModel;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::products::{CreateProductRequest, UpdateProductRequest};
use crate::ApiResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductFilter {
    /// Filter by category
    pub category: Option<String>,
}

/// Storefront product listing (active products only)
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductFilter),
    responses(
        (status = 200, description = "Active products", body = crate::ApiResponse<Vec<ProductModel>>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ApiResponse<Vec<ProductModel>>>, ServiceError> {
    let products = state
        .services
        .products
        .list(filter.category, false)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

/// Fetch one product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = crate::ApiResponse<ProductModel>),
        (status = 404, description = "No such product", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductModel>>, ServiceError> {
    let product = state.services.products.get(product_id).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Admin listing including inactive products
#[utoipa::path(
    get,
    path = "/api/v1/admin/products",
    params(ProductFilter),
    responses(
        (status = 200, description = "All products", body = crate::ApiResponse<Vec<ProductModel>>),
        (status = 403, description = "Not the admin", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn admin_list_products(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ApiResponse<Vec<ProductModel>>>, ServiceError> {
    let products = state.services.products.list(filter.category, true).await?;
    Ok(Json(ApiResponse::success(products)))
}

/// Create a product (admin)
#[utoipa::path(
    post,
    path = "/api/v1/admin/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = crate::ApiResponse<ProductModel>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn admin_create_product(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductModel>>), ServiceError> {
    let product = state.services.products.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

/// Update a product (admin)
#[utoipa::path(
    put,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = crate::ApiResponse<ProductModel>),
        (status = 404, description = "No such product", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn admin_update_product(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductModel>>, ServiceError> {
    let product = state.services.products.update(product_id, request).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Public product routes
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Admin product routes
pub fn admin_product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_products))
        .route("/", post(admin_create_product))
        .route("/:id", put(admin_update_product))
}
