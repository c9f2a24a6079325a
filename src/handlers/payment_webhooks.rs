use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::{errors::ServiceError, handlers::AppState};

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub ok: bool,
}

/// Provider webhook receiver. The signature is verified over the raw body
/// bytes before any parsing; once it checks out, every event type is
/// acknowledged with 200 whether or not it is relevant.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook acknowledged", body = WebhookAck),
        (status = 400, description = "Invalid signature or unusable payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook arrived without a signature header");
            ServiceError::SignatureMismatch
        })?;

    state
        .services
        .checkout
        .apply_webhook_event(&body, signature)
        .await?;

    Ok(Json(WebhookAck { ok: true }))
}

/// Webhook routes. No identity headers here: webhooks are server-to-server
/// and authenticate by signature alone.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}
