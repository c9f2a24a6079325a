use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Shipping address owned by a single identity. At most one address per
/// owner carries `is_default = true`; the service layer flips defaults
/// inside one transaction.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: String,
    pub owner_email: String,
    pub name: String,
    pub phone: String,
    #[sea_orm(nullable)]
    pub alt_phone: Option<String>,
    pub line: String,
    pub locality: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[sea_orm(nullable)]
    pub landmark: Option<String>,
    pub kind: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
