use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only inventory ledger entry. `quantity` is signed by movement
/// type (positive for in/return, negative for out/disposal) and
/// `total_value` is always `|quantity| * unit_cost`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub movement_type: MovementType,
    pub product_id: Uuid,
    #[sea_orm(nullable)]
    pub batch_id: Option<Uuid>,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_value: Decimal,
    pub reason: String,
    #[sea_orm(nullable)]
    pub reference_type: Option<ReferenceKind>,
    #[sea_orm(nullable)]
    pub reference_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub location: Option<String>,
    pub performed_by: Uuid,
    #[sea_orm(nullable)]
    pub approved_by: Option<Uuid>,
    pub status: MovementStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::batch::Entity",
        from = "Column::BatchId",
        to = "super::batch::Column::Id"
    )]
    Batch,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    #[sea_orm(string_value = "in")]
    In,
    #[sea_orm(string_value = "out")]
    Out,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "return")]
    Return,
    #[sea_orm(string_value = "disposal")]
    Disposal,
}

impl MovementType {
    /// Sign applied to a raw quantity when recorded under this type.
    pub fn sign(&self) -> i32 {
        match self {
            Self::In | Self::Return => 1,
            Self::Out | Self::Disposal => -1,
            Self::Adjustment | Self::Transfer => 1,
        }
    }
}

/// Polymorphic reference target, stored as a tagged column pair
/// (`reference_type`, `reference_id`) instead of a dynamic lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    #[sea_orm(string_value = "order")]
    Order,
    #[sea_orm(string_value = "batch")]
    Batch,
    #[sea_orm(string_value = "supplier")]
    Supplier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "completed")]
    Completed,
}
