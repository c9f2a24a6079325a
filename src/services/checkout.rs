//! Checkout and payment-capture lifecycle.
//!
//! Owns the path from cart snapshot to persisted paid order: intent creation
//! against the gateway, per-request signature verification, webhook
//! verification, and the exactly-once find-or-create keyed on the gateway
//! payment reference.

use std::sync::Arc;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::GatewayConfig,
    db::{is_unique_violation, DbPool},
    entities::order::{
        ActiveModel as OrderActiveModel, Column as OrderColumn, Entity as OrderEntity,
        Model as OrderModel,
    },
    entities::order_item::ActiveModel as OrderItemActiveModel,
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{self, PaymentGateway},
    services::addresses::AddressKind,
    services::order_status::{FulfillmentStatus, PaymentStatus, RefundStatus},
};

/// One line of a cart snapshot. Never persisted as-is; item rows are written
/// only when a payment is captured.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartLine {
    #[validate(length(min = 1, message = "Product reference is required"))]
    pub product_ref: String,
    #[validate(length(min = 1, message = "Item name is required"))]
    pub name: String,
    pub unit_price: Decimal,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub image_ref: Option<String>,
}

/// Address snapshot embedded into an order at capture time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddressSnapshot {
    #[validate(length(min = 1, message = "Recipient name is required"))]
    pub name: String,
    #[validate(length(min = 4, message = "Phone number is required"))]
    pub phone: String,
    pub alt_phone: Option<String>,
    #[validate(length(min = 1, message = "Street address is required"))]
    pub line: String,
    pub locality: String,
    pub city: String,
    pub state: String,
    #[validate(length(min = 3, message = "Postal code is required"))]
    pub postal_code: String,
    pub landmark: Option<String>,
    pub kind: AddressKind,
}

/// What the client needs to launch the provider's payment widget.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntent {
    pub gateway_order_ref: String,
    pub amount_minor: i64,
    pub currency: String,
    pub provider_public_key: String,
}

/// Result of the idempotent capture path. A duplicate confirmation is a
/// success carrying the existing order, never an error.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    Created(OrderModel),
    AlreadyExisted(OrderModel),
}

impl ConfirmOutcome {
    pub fn order(&self) -> &OrderModel {
        match self {
            ConfirmOutcome::Created(order) | ConfirmOutcome::AlreadyExisted(order) => order,
        }
    }

    pub fn order_id(&self) -> Uuid {
        self.order().id
    }

    pub fn was_created(&self) -> bool {
        matches!(self, ConfirmOutcome::Created(_))
    }
}

/// Result of a verified webhook delivery.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    Processed(ConfirmOutcome),
    Ignored,
}

/// Metadata attached to the remote order so a webhook alone can rebuild the
/// local order.
#[derive(Debug, Serialize, Deserialize)]
struct OrderMetadata {
    owner_id: String,
    owner_email: String,
    items: Vec<CartLine>,
    address: AddressSnapshot,
}

/// Recomputes the cart total. Client-declared totals are never trusted.
pub fn cart_total(cart: &[CartLine]) -> Result<Decimal, ServiceError> {
    if cart.is_empty() {
        return Err(ServiceError::InvalidCart("cart is empty".to_string()));
    }

    let mut total = Decimal::ZERO;
    for line in cart {
        line.validate()
            .map_err(|e| ServiceError::InvalidCart(e.to_string()))?;
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::InvalidCart(format!(
                "unit price for '{}' must not be negative",
                line.name
            )));
        }
        total += line.unit_price * Decimal::from(line.quantity);
    }

    Ok(total)
}

/// Converts a major-unit amount to the provider's integral minor unit.
/// Midpoints round away from zero, matching how prices are displayed.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("amount {} out of range", amount))
        })
}

fn generate_receipt() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(14)
        .map(char::from)
        .collect();
    format!("rcpt_{}", suffix)
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    gateway_cfg: GatewayConfig,
    event_sender: Option<Arc<EventSender>>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        gateway_cfg: GatewayConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            gateway,
            gateway_cfg,
            event_sender,
        }
    }

    /// Creates a payment intent at the gateway without persisting anything
    /// locally. The returned reference is what the client hands to the
    /// provider's widget.
    #[instrument(skip(self, cart, address), fields(owner_id = %owner_id, lines = cart.len()))]
    pub async fn create_intent(
        &self,
        owner_id: &str,
        owner_email: &str,
        cart: &[CartLine],
        address: &AddressSnapshot,
        receipt: Option<String>,
    ) -> Result<PaymentIntent, ServiceError> {
        let amount = cart_total(cart)?;
        address
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        let amount_minor = to_minor_units(amount)?;

        let metadata = serde_json::to_value(OrderMetadata {
            owner_id: owner_id.to_string(),
            owner_email: owner_email.to_string(),
            items: cart.to_vec(),
            address: address.clone(),
        })?;

        let receipt = receipt.unwrap_or_else(generate_receipt);
        let remote = self
            .gateway
            .create_remote_order(amount_minor, &self.gateway_cfg.currency, &receipt, metadata)
            .await?;

        info!(
            gateway_order_ref = %remote.gateway_order_ref,
            amount_minor = remote.amount_minor,
            "Payment intent created"
        );

        Ok(PaymentIntent {
            gateway_order_ref: remote.gateway_order_ref,
            amount_minor: remote.amount_minor,
            currency: remote.currency,
            provider_public_key: self.gateway_cfg.key_id.clone(),
        })
    }

    /// Verifies a client-side payment confirmation and persists the order
    /// exactly once per captured payment.
    #[instrument(skip_all, fields(gateway_order_ref = %gateway_order_ref, payment_ref = %payment_ref))]
    #[allow(clippy::too_many_arguments)]
    pub async fn confirm_payment(
        &self,
        owner_id: &str,
        owner_email: &str,
        gateway_order_ref: &str,
        payment_ref: &str,
        signature: &str,
        cart: &[CartLine],
        address: &AddressSnapshot,
    ) -> Result<ConfirmOutcome, ServiceError> {
        if !gateway::verify_payment_signature(
            gateway_order_ref,
            payment_ref,
            signature,
            &self.gateway_cfg.key_secret,
        ) {
            warn!(
                gateway_order_ref = %gateway_order_ref,
                "Payment confirmation signature mismatch"
            );
            return Err(ServiceError::SignatureMismatch);
        }

        self.find_or_create_paid_order(
            owner_id,
            owner_email,
            payment_ref,
            gateway_order_ref,
            cart,
            address,
        )
        .await
    }

    /// Provider's current view of an intent. The reconciliation path after
    /// an indeterminate create: poll instead of blindly retrying.
    #[instrument(skip(self))]
    pub async fn remote_order_status(
        &self,
        gateway_order_ref: &str,
    ) -> Result<crate::gateway::RemoteOrderStatus, ServiceError> {
        self.gateway.fetch_order_status(gateway_order_ref).await
    }

    /// Applies a provider webhook. The signature covers the raw body bytes
    /// and uses the webhook secret, independent of the per-request scheme.
    /// Payment-captured events run the same idempotent create; anything else
    /// is acknowledged and ignored.
    #[instrument(skip_all)]
    pub async fn apply_webhook_event(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, ServiceError> {
        if !gateway::verify_webhook_signature(
            raw_body,
            signature_header,
            &self.gateway_cfg.webhook_secret,
        ) {
            warn!("Webhook signature verification failed");
            return Err(ServiceError::SignatureMismatch);
        }

        let payload: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::ValidationError(format!("invalid webhook body: {}", e)))?;

        let event_type = payload
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        match event_type {
            "payment.captured" => {
                let entity = payload
                    .pointer("/payload/payment/entity")
                    .cloned()
                    .ok_or_else(|| {
                        ServiceError::ValidationError(
                            "webhook payload missing payment entity".to_string(),
                        )
                    })?;

                let payment_ref = entity
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ServiceError::ValidationError(
                            "webhook payment entity missing id".to_string(),
                        )
                    })?
                    .to_string();
                let gateway_order_ref = entity
                    .get("order_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();

                let metadata: OrderMetadata = serde_json::from_value(
                    entity.get("notes").cloned().unwrap_or_default(),
                )
                .map_err(|e| {
                    error!(payment_ref = %payment_ref, "Webhook metadata unusable: {}", e);
                    ServiceError::ValidationError(format!(
                        "webhook metadata missing or malformed: {}",
                        e
                    ))
                })?;

                let outcome = self
                    .find_or_create_paid_order(
                        &metadata.owner_id,
                        &metadata.owner_email,
                        &payment_ref,
                        &gateway_order_ref,
                        &metadata.items,
                        &metadata.address,
                    )
                    .await?;

                Ok(WebhookOutcome::Processed(outcome))
            }
            other => {
                info!(event_type = %other, "Ignoring webhook event type");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// The exactly-once core. Looks up by payment ref inside a transaction;
    /// a concurrent duplicate that slips past the lookup is caught by the
    /// unique index and resolved by fetching the winner's row.
    async fn find_or_create_paid_order(
        &self,
        owner_id: &str,
        owner_email: &str,
        payment_ref: &str,
        gateway_order_ref: &str,
        cart: &[CartLine],
        address: &AddressSnapshot,
    ) -> Result<ConfirmOutcome, ServiceError> {
        if owner_id.trim().is_empty() || owner_email.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "order owner identity must not be empty".to_string(),
            ));
        }

        let amount = cart_total(cart)?;
        address
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        let address_json = serde_json::to_string(address)?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        if let Some(existing) = OrderEntity::find()
            .filter(OrderColumn::PaymentRef.eq(payment_ref))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
        {
            txn.commit().await.map_err(ServiceError::DatabaseError)?;
            info!(order_id = %existing.id, "Duplicate capture confirmation, returning existing order");
            return Ok(ConfirmOutcome::AlreadyExisted(existing));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let order_active = OrderActiveModel {
            id: Set(order_id),
            owner_id: Set(owner_id.to_string()),
            owner_email: Set(owner_email.to_string()),
            amount: Set(amount),
            currency: Set(self.gateway_cfg.currency.clone()),
            payment_status: Set(PaymentStatus::Paid.to_string()),
            payment_ref: Set(Some(payment_ref.to_string())),
            gateway_order_ref: Set(Some(gateway_order_ref.to_string())),
            status: Set(FulfillmentStatus::Processing.to_string()),
            refund_status: Set(RefundStatus::None.to_string()),
            refund_ref: Set(None),
            shipping_address: Set(address_json),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };

        let order_model = match order_active.insert(&txn).await {
            Ok(model) => model,
            Err(e) if is_unique_violation(&e) => {
                // Lost the race against a concurrent duplicate; the winner's
                // row is the order.
                txn.rollback().await.ok();
                let existing = OrderEntity::find()
                    .filter(OrderColumn::PaymentRef.eq(payment_ref))
                    .one(&*self.db)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .ok_or(ServiceError::InternalServerError)?;
                info!(order_id = %existing.id, "Concurrent capture resolved to existing order");
                return Ok(ConfirmOutcome::AlreadyExisted(existing));
            }
            Err(e) => {
                error!(payment_ref = %payment_ref, "Failed to persist order: {}", e);
                return Err(ServiceError::DatabaseError(e));
            }
        };

        for line in cart {
            let item = OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_ref: Set(line.product_ref.clone()),
                name: Set(line.name.clone()),
                unit_price: Set(line.unit_price),
                quantity: Set(line.quantity),
                image_ref: Set(line.image_ref.clone()),
                created_at: Set(now),
            };
            item.insert(&txn).await.map_err(ServiceError::DatabaseError)?;
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, payment_ref = %payment_ref, "Order persisted from captured payment");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(order_id = %order_id, "Failed to send order created event: {}", e);
            }
            if let Err(e) = event_sender
                .send(Event::PaymentCaptured {
                    order_id,
                    payment_ref: payment_ref.to_string(),
                })
                .await
            {
                warn!(order_id = %order_id, "Failed to send payment captured event: {}", e);
            }
        }

        Ok(ConfirmOutcome::Created(order_model))
    }
}
