use crate::{
    db::DbPool,
    entities::order::{
        ActiveModel as OrderActiveModel, Column as OrderColumn, Entity as OrderEntity,
        Model as OrderModel,
    },
    entities::order_item::{Entity as OrderItemEntity, Model as OrderItemModel},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::PaymentGateway,
    services::checkout::to_minor_units,
    services::order_status::{
        is_valid_transition, FulfillmentStatus, PaymentStatus, RefundStatus,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_ref: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub image_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub owner_id: String,
    pub owner_email: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_status: String,
    pub payment_ref: Option<String>,
    pub gateway_order_ref: Option<String>,
    pub status: String,
    pub refund_status: String,
    pub refund_ref: Option<String>,
    pub shipping_address: serde_json::Value,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderResponse {
    pub fn from_model(order: OrderModel, items: Vec<OrderItemModel>) -> Self {
        // The stored snapshot is JSON we wrote ourselves; fall back to the
        // raw string rather than failing a read path.
        let shipping_address = serde_json::from_str(&order.shipping_address)
            .unwrap_or(serde_json::Value::String(order.shipping_address.clone()));

        Self {
            id: order.id,
            owner_id: order.owner_id,
            owner_email: order.owner_email,
            amount: order.amount,
            currency: order.currency,
            payment_status: order.payment_status,
            payment_ref: order.payment_ref,
            gateway_order_ref: order.gateway_order_ref,
            status: order.status,
            refund_status: order.refund_status,
            refund_ref: order.refund_ref,
            shipping_address,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_ref: item.product_ref,
                    name: item.name,
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    image_ref: item.image_ref,
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Service for order queries, fulfillment transitions and the refund
/// sub-state machine.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
        }
    }

    /// Lists a caller's own orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(OrderColumn::OwnerId.eq(owner_id))
            .order_by_desc(OrderColumn::CreatedAt)
            .find_with_related(OrderItemEntity)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(orders
            .into_iter()
            .map(|(order, items)| OrderResponse::from_model(order, items))
            .collect())
    }

    /// Lists every order, newest first. Admin surface only.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = OrderEntity::find()
            .order_by_desc(OrderColumn::CreatedAt)
            .find_with_related(OrderItemEntity)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(orders
            .into_iter()
            .map(|(order, items)| OrderResponse::from_model(order, items))
            .collect())
    }

    /// Fetches one order with its line items.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_with_items(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let mut rows = OrderEntity::find_by_id(order_id)
            .find_with_related(OrderItemEntity)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let (order, items) = rows
            .pop()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        Ok(OrderResponse::from_model(order, items))
    }

    /// Marks a paid, refund-free order as refund-requested. Owner-initiated;
    /// foreign orders read as not found rather than forbidden.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn request_refund(
        &self,
        order_id: Uuid,
        owner_id: &str,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .filter(|order| order.owner_id == owner_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payment_status != PaymentStatus::Paid.to_string() {
            return Err(ServiceError::InvalidTransition(
                "only paid orders can request a refund".to_string(),
            ));
        }
        if order.refund_status != RefundStatus::None.to_string() {
            return Err(ServiceError::InvalidTransition(format!(
                "refund already {}",
                order.refund_status
            )));
        }

        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.refund_status = Set(RefundStatus::Requested.to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, "Refund requested");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::RefundRequested(order_id)).await {
                warn!(order_id = %order_id, "Failed to send refund requested event: {}", e);
            }
        }

        Ok(updated)
    }

    /// Refunds the full captured amount through the gateway and then flips
    /// payment/refund/fulfillment state in one write. Gateway declines and
    /// indeterminate outcomes leave the order untouched, so the call is
    /// safely retryable.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn approve_refund(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payment_status != PaymentStatus::Paid.to_string() {
            return Err(ServiceError::InvalidTransition(format!(
                "cannot refund an order with payment status '{}'",
                order.payment_status
            )));
        }
        if order.refund_status == RefundStatus::Processed.to_string() {
            return Err(ServiceError::InvalidTransition(
                "refund already processed".to_string(),
            ));
        }
        let payment_ref = order.payment_ref.clone().ok_or_else(|| {
            ServiceError::InvalidTransition("order has no captured payment".to_string())
        })?;

        let amount_minor = to_minor_units(order.amount)?;

        // Remote call first; local state is only mutated on a definite
        // success, so declines and timeouts leave nothing to undo.
        let refund_ref = self.gateway.refund(&payment_ref, amount_minor).await?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        // A concurrent approval may have recorded the refund while the
        // gateway call was in flight; the provider deduplicates by receipt,
        // so just return the already-updated order.
        if order.refund_status == RefundStatus::Processed.to_string() {
            txn.commit().await.map_err(ServiceError::DatabaseError)?;
            return Ok(order);
        }

        let old_status = order.status.clone();
        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.payment_status = Set(PaymentStatus::Refunded.to_string());
        active.refund_status = Set(RefundStatus::Processed.to_string());
        active.refund_ref = Set(Some(refund_ref.clone()));
        active.status = Set(FulfillmentStatus::Cancelled.to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await.map_err(|e| {
            error!(order_id = %order_id, "Failed to record processed refund: {}", e);
            ServiceError::DatabaseError(e)
        })?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, refund_ref = %refund_ref, "Refund processed");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::RefundProcessed {
                    order_id,
                    refund_ref,
                })
                .await
            {
                warn!(order_id = %order_id, "Failed to send refund processed event: {}", e);
            }
            if let Err(e) = event_sender
                .send(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status: FulfillmentStatus::Cancelled.to_string(),
                })
                .await
            {
                warn!(order_id = %order_id, "Failed to send status changed event: {}", e);
            }
        }

        Ok(updated)
    }

    /// Applies an admin fulfillment transition after checking it against the
    /// transition table. Illegal transitions mutate nothing.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_fulfillment_status(
        &self,
        order_id: Uuid,
        new_status: FulfillmentStatus,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = FulfillmentStatus::from_str(&order.status).map_err(|_| {
            error!(order_id = %order_id, status = %order.status, "Stored status unparseable");
            ServiceError::InternalServerError
        })?;

        if !is_valid_transition(current, new_status) {
            return Err(ServiceError::InvalidTransition(format!(
                "cannot transition from '{}' to '{}'",
                current, new_status
            )));
        }

        if current == new_status {
            txn.commit().await.map_err(ServiceError::DatabaseError)?;
            return Ok(order);
        }

        let old_status = order.status.clone();
        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status: new_status.to_string(),
                })
                .await
            {
                warn!(order_id = %order_id, "Failed to send status changed event: {}", e);
            }
        }

        Ok(updated)
    }
}
