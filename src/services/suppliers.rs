use crate::{
    entities::{
        supplier::{self, SupplierStatus},
        Supplier,
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub rating: Option<i32>,
}

impl SupplierService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input))]
    pub async fn create_supplier(
        &self,
        input: CreateSupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        input.validate()?;

        let rating = input.rating.unwrap_or(5);
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::ValidationError(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        let duplicate = Supplier::find()
            .filter(supplier::Column::Code.eq(input.code.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if duplicate {
            return Err(ServiceError::Conflict(format!(
                "supplier code {} already exists",
                input.code
            )));
        }

        let now = Utc::now();
        let model = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(input.code),
            name: Set(input.name),
            contact_name: Set(input.contact_name),
            email: Set(input.email),
            phone: Set(input.phone),
            address: Set(input.address),
            status: Set(SupplierStatus::Active),
            rating: Set(rating),
            total_orders: Set(0),
            total_value: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(supplier_id = %model.id, code = %model.code, "supplier created");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get_supplier(&self, supplier_id: Uuid) -> Result<supplier::Model, ServiceError> {
        Supplier::find_by_id(supplier_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {supplier_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<supplier::Model>, u64), ServiceError> {
        let paginator = Supplier::find()
            .order_by_asc(supplier::Column::Code)
            .paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await?;
        let suppliers = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((suppliers, total))
    }
}
