use crate::{
    entities::{product, Product},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Days before expiry at which the automatic discount kicks in.
pub const AUTO_SALE_WINDOW_DAYS: i64 = 30;

/// Catalog service: product reads always pass through the auto-sale
/// policy, so the discount is computed at serve time and never persisted.
/// The stored `sale_price` column only carries manual markdowns.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
}

/// Product as served to clients, with the expiry discount applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub is_on_sale: bool,
    pub stock_quantity: i32,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock_quantity: i32,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<Decimal>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// The automatic markdown: 10% off, rounded to cents.
pub fn auto_sale_price(price: Decimal) -> Decimal {
    (price * dec!(0.9)).round_dp(2)
}

/// Effective discount for a product at `now`.
///
/// Inside the expiry window the automatic price applies unless a lower
/// stored markdown exists. Outside the window a stored price equal to the
/// automatic one is treated as a leftover automatic discount and cleared;
/// anything else was set manually and is preserved.
pub fn effective_sale(
    price: Decimal,
    stored_sale: Option<Decimal>,
    expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<Decimal> {
    let auto = auto_sale_price(price);
    let within_window = expiry
        .map(|e| (e.date_naive() - now.date_naive()).num_days() <= AUTO_SALE_WINDOW_DAYS)
        .unwrap_or(false);

    if within_window {
        match stored_sale {
            Some(s) if s < auto => Some(s),
            _ => Some(auto),
        }
    } else {
        match stored_sale {
            Some(s) if s == auto => None,
            other => other,
        }
    }
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn view(model: product::Model, now: DateTime<Utc>) -> ProductView {
        let sale = effective_sale(model.price, model.sale_price, model.expiry_date, now);
        ProductView {
            id: model.id,
            name: model.name,
            description: model.description,
            brand: model.brand,
            category: model.category,
            image_url: model.image_url,
            price: model.price,
            is_on_sale: sale.is_some(),
            sale_price: sale,
            stock_quantity: model.stock_quantity,
            expiry_date: model.expiry_date,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        staff_id: Uuid,
        input: CreateProductInput,
    ) -> Result<ProductView, ServiceError> {
        input.validate()?;
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must be positive".to_string(),
            ));
        }
        if input.stock_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "stock_quantity cannot be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            brand: Set(input.brand),
            category: Set(input.category),
            image_url: Set(input.image_url),
            price: Set(input.price),
            sale_price: Set(None),
            is_on_sale: Set(false),
            stock_quantity: Set(input.stock_quantity),
            expiry_date: Set(input.expiry_date),
            created_by: Set(staff_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %model.id, "product created");
        Ok(Self::view(model, now))
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        caller_id: Uuid,
        is_admin: bool,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductView, ServiceError> {
        input.validate()?;

        let model = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

        if !is_admin && model.created_by != caller_id {
            return Err(ServiceError::Forbidden(
                "You can only update products you created".to_string(),
            ));
        }

        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "price must be positive".to_string(),
                ));
            }
        }

        let mut active: product::ActiveModel = model.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(brand) = input.brand {
            active.brand = Set(Some(brand));
        }
        if let Some(category) = input.category {
            active.category = Set(Some(category));
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(expiry) = input.expiry_date {
            active.expiry_date = Set(Some(expiry));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        Ok(Self::view(updated, Utc::now()))
    }

    /// Manual markdown. Rejected outside the expiry window or when the
    /// markdown does not undercut the list price.
    #[instrument(skip(self))]
    pub async fn set_sale_price(
        &self,
        caller_id: Uuid,
        is_admin: bool,
        product_id: Uuid,
        sale_price: Decimal,
    ) -> Result<ProductView, ServiceError> {
        let model = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

        if !is_admin && model.created_by != caller_id {
            return Err(ServiceError::Forbidden(
                "You can only discount products you created".to_string(),
            ));
        }

        let now = Utc::now();
        let within_window = model
            .expiry_date
            .map(|e| (e.date_naive() - now.date_naive()).num_days() <= AUTO_SALE_WINDOW_DAYS)
            .unwrap_or(false);
        if !within_window {
            return Err(ServiceError::ValidationError(
                "manual markdowns are only allowed within 30 days of expiry".to_string(),
            ));
        }
        if sale_price >= model.price {
            return Err(ServiceError::ValidationError(
                "sale price must be below the list price".to_string(),
            ));
        }
        if sale_price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "sale price must be positive".to_string(),
            ));
        }

        let mut active: product::ActiveModel = model.into();
        active.sale_price = Set(Some(sale_price));
        active.is_on_sale = Set(true);
        active.updated_at = Set(now);
        let updated = active.update(&*self.db).await?;

        info!(product_id = %product_id, %sale_price, "manual markdown set");
        Ok(Self::view(updated, now))
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductView, ServiceError> {
        let model = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;
        Ok(Self::view(model, Utc::now()))
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        limit: u64,
        category: Option<String>,
    ) -> Result<(Vec<ProductView>, u64), ServiceError> {
        let mut query = Product::find().order_by_desc(product::Column::CreatedAt);
        if let Some(category) = category {
            query = query.filter(product::Column::Category.eq(category));
        }

        let paginator = query.paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;

        let now = Utc::now();
        Ok((
            models.into_iter().map(|m| Self::view(m, now)).collect(),
            total,
        ))
    }

    /// Products whose on-hand quantity dropped below the threshold.
    #[instrument(skip(self))]
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<ProductView>, ServiceError> {
        let models = Product::find()
            .filter(product::Column::StockQuantity.lt(threshold))
            .order_by_asc(product::Column::StockQuantity)
            .all(&*self.db)
            .await?;

        let now = Utc::now();
        Ok(models.into_iter().map(|m| Self::view(m, now)).collect())
    }
}
