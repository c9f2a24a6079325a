//! Product catalogue. Read-mostly from the lifecycle's perspective; the
//! admin surface mutates price, stock and active flags.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::product::{
        ActiveModel as ProductActiveModel, Column as ProductColumn, Entity as ProductEntity,
        Model as ProductModel,
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    pub price: Decimal,
    pub mrp: Decimal,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub image_ref: Option<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub category: Option<String>,
    pub image_ref: Option<String>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Storefront listing: active products only, optionally filtered by
    /// category. The admin listing passes `include_inactive`.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        category: Option<String>,
        include_inactive: bool,
    ) -> Result<Vec<ProductModel>, ServiceError> {
        let mut query = ProductEntity::find().order_by_desc(ProductColumn::CreatedAt);

        if !include_inactive {
            query = query.filter(ProductColumn::IsActive.eq(true));
        }
        if let Some(category) = category {
            query = query.filter(ProductColumn::Category.eq(category));
        }

        query.all(&*self.db).await.map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.price < Decimal::ZERO || request.mrp < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price and mrp must not be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let active = ProductActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            price: Set(request.price),
            mrp: Set(request.mrp),
            category: Set(request.category),
            image_ref: Set(request.image_ref),
            stock: Set(request.stock),
            is_active: Set(request.is_active),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let created = active
            .insert(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    #[instrument(skip(self, request), fields(product_id = %product_id))]
    pub async fn update(
        &self,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        let existing = self.get(product_id).await?;

        if let Some(price) = request.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "price must not be negative".to_string(),
                ));
            }
        }

        let mut active: ProductActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(mrp) = request.mrp {
            active.mrp = Set(mrp);
        }
        if let Some(category) = request.category {
            active.category = Set(category);
        }
        if let Some(image_ref) = request.image_ref {
            active.image_ref = Set(Some(image_ref));
        }
        if let Some(stock) = request.stock {
            active.stock = Set(stock);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Some(Utc::now()));

        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
