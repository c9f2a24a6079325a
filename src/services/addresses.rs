//! Shipping address book.
//!
//! The only invariant worth guarding: at most one default address per owner.
//! Any write that sets a new default clears the previous one inside the same
//! transaction, so no interleaving leaves two defaults standing.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::address::{
        ActiveModel as AddressActiveModel, Column as AddressColumn, Entity as AddressEntity,
        Model as AddressModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Closed set of address labels, validated at the boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum AddressKind {
    Home,
    Work,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpsertAddressRequest {
    #[validate(length(min = 1, message = "Recipient name is required"))]
    pub name: String,
    #[validate(length(min = 4, message = "Phone number is required"))]
    pub phone: String,
    pub alt_phone: Option<String>,
    #[validate(length(min = 1, message = "Street address is required"))]
    pub line: String,
    #[serde(default)]
    pub locality: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 3, message = "Postal code is required"))]
    pub postal_code: String,
    pub landmark: Option<String>,
    pub kind: AddressKind,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Clone)]
pub struct AddressService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl AddressService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Lists an owner's addresses, default first, then newest.
    #[instrument(skip(self))]
    pub async fn list_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<AddressModel>, ServiceError> {
        AddressEntity::find()
            .filter(AddressColumn::OwnerId.eq(owner_id))
            .order_by_desc(AddressColumn::IsDefault)
            .order_by_desc(AddressColumn::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self, request), fields(owner_id = %owner_id))]
    pub async fn create(
        &self,
        owner_id: &str,
        owner_email: &str,
        request: UpsertAddressRequest,
    ) -> Result<AddressModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        if request.is_default {
            Self::clear_defaults(&txn, owner_id, None).await?;
        }

        let now = Utc::now();
        let address_id = Uuid::new_v4();
        let active = AddressActiveModel {
            id: Set(address_id),
            owner_id: Set(owner_id.to_string()),
            owner_email: Set(owner_email.to_string()),
            name: Set(request.name),
            phone: Set(request.phone),
            alt_phone: Set(request.alt_phone),
            line: Set(request.line),
            locality: Set(request.locality),
            city: Set(request.city),
            state: Set(request.state),
            postal_code: Set(request.postal_code),
            landmark: Set(request.landmark),
            kind: Set(request.kind.to_string()),
            is_default: Set(request.is_default),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let created = active.insert(&txn).await.map_err(ServiceError::DatabaseError)?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(address_id = %created.id, "Address created");

        if created.is_default {
            self.notify_default_changed(owner_id, created.id).await;
        }

        Ok(created)
    }

    #[instrument(skip(self, request), fields(address_id = %address_id))]
    pub async fn update(
        &self,
        address_id: Uuid,
        owner_id: &str,
        request: UpsertAddressRequest,
    ) -> Result<AddressModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let existing = AddressEntity::find_by_id(address_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .filter(|address| address.owner_id == owner_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Address {} not found", address_id))
            })?;

        if request.is_default {
            Self::clear_defaults(&txn, owner_id, Some(address_id)).await?;
        }

        let mut active: AddressActiveModel = existing.into();
        active.name = Set(request.name);
        active.phone = Set(request.phone);
        active.alt_phone = Set(request.alt_phone);
        active.line = Set(request.line);
        active.locality = Set(request.locality);
        active.city = Set(request.city);
        active.state = Set(request.state);
        active.postal_code = Set(request.postal_code);
        active.landmark = Set(request.landmark);
        active.kind = Set(request.kind.to_string());
        active.is_default = Set(request.is_default);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        if updated.is_default {
            self.notify_default_changed(owner_id, updated.id).await;
        }

        Ok(updated)
    }

    /// Deletes an address. Orders are untouched: they carry their own
    /// snapshot of the address at capture time.
    #[instrument(skip(self), fields(address_id = %address_id))]
    pub async fn delete(&self, address_id: Uuid, owner_id: &str) -> Result<(), ServiceError> {
        let existing = AddressEntity::find_by_id(address_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .filter(|address| address.owner_id == owner_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Address {} not found", address_id))
            })?;

        AddressEntity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(address_id = %address_id, "Address deleted");
        Ok(())
    }

    /// Clears is_default on all of an owner's addresses except `keep`.
    /// Callers run this inside the transaction that sets the new default.
    async fn clear_defaults(
        txn: &sea_orm::DatabaseTransaction,
        owner_id: &str,
        keep: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = AddressEntity::update_many()
            .col_expr(AddressColumn::IsDefault, sea_orm::sea_query::Expr::value(false))
            .filter(AddressColumn::OwnerId.eq(owner_id))
            .filter(AddressColumn::IsDefault.eq(true));

        if let Some(keep_id) = keep {
            query = query.filter(AddressColumn::Id.ne(keep_id));
        }

        query.exec(txn).await.map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    async fn notify_default_changed(&self, owner_id: &str, address_id: Uuid) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::AddressDefaultChanged {
                    owner_id: owner_id.to_string(),
                    address_id,
                })
                .await
            {
                warn!(address_id = %address_id, "Failed to send default changed event: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn address_kind_is_closed() {
        assert_eq!(AddressKind::from_str("Home").unwrap(), AddressKind::Home);
        assert_eq!(AddressKind::from_str("Work").unwrap(), AddressKind::Work);
        assert!(AddressKind::from_str("Villa").is_err());
    }

    #[test]
    fn upsert_request_validates_required_fields() {
        let request = UpsertAddressRequest {
            name: String::new(),
            phone: "99".to_string(),
            alt_phone: None,
            line: "1 Lane".to_string(),
            locality: String::new(),
            city: "Pune".to_string(),
            state: "MH".to_string(),
            postal_code: "411001".to_string(),
            landmark: None,
            kind: AddressKind::Home,
            is_default: false,
        };
        assert!(request.validate().is_err());
    }
}
