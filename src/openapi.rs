use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront Order/Payment API

REST backend for a small multi-vendor storefront.

## Flow

1. `POST /api/v1/payments/create-order` turns a cart snapshot into a payment
   intent at the gateway; the total is recomputed server-side.
2. The client completes payment in the provider's widget.
3. `POST /api/v1/payments/confirm` verifies the HMAC signature and persists
   the order exactly once per captured payment. The provider's webhook
   (`POST /api/v1/payments/webhook`) performs the same idempotent create.
4. Admin endpoints drive fulfillment transitions and refunds.

## Identity

Requests carry opaque, already-verified identity headers (`x-user-id`,
`x-user-email`); credentials are never parsed here. Webhooks authenticate by
body signature instead.

## Error Handling

Errors share one shape:

```json
{
  "success": false,
  "error": "Bad Request",
  "message": "Invalid cart: cart is empty",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
"#
    ),
    paths(
        crate::handlers::payments::create_payment_order,
        crate::handlers::payments::confirm_payment,
        crate::handlers::payments::remote_order_status,
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::admin_list_orders,
        crate::handlers::orders::request_refund,
        crate::handlers::orders::admin_refund,
        crate::handlers::orders::admin_update_status,
        crate::handlers::addresses::my_addresses,
        crate::handlers::addresses::create_address,
        crate::handlers::addresses::update_address,
        crate::handlers::addresses::delete_address,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::admin_list_products,
        crate::handlers::products::admin_create_product,
        crate::handlers::products::admin_update_product,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::checkout::CartLine,
        crate::services::checkout::AddressSnapshot,
        crate::services::checkout::PaymentIntent,
        crate::services::addresses::AddressKind,
        crate::services::addresses::UpsertAddressRequest,
        crate::services::orders::OrderResponse,
        crate::services::orders::OrderItemResponse,
        crate::services::products::CreateProductRequest,
        crate::services::products::UpdateProductRequest,
        crate::handlers::payments::CreatePaymentOrderRequest,
        crate::handlers::payments::ConfirmPaymentRequest,
        crate::handlers::payments::ConfirmPaymentResponse,
        crate::handlers::payments::RemoteOrderStatusResponse,
        crate::gateway::RemoteOrderStatus,
        crate::handlers::payment_webhooks::WebhookAck,
        crate::handlers::orders::RefundRequestedResponse,
        crate::handlers::orders::RefundProcessedResponse,
        crate::handlers::orders::UpdateOrderStatusRequest,
    )),
    tags(
        (name = "Payments", description = "Payment intent, capture confirmation and webhooks"),
        (name = "Orders", description = "Owner-facing order queries and refund requests"),
        (name = "Addresses", description = "Shipping address book"),
        (name = "Products", description = "Product catalogue"),
        (name = "Admin", description = "Admin-only order, refund and product mutations"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_routes() -> Router<AppState> {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
