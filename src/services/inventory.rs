use crate::{
    entities::{
        batch::{self, BatchStatus},
        product,
        stock_movement::{self, MovementStatus, MovementType, ReferenceKind},
        supplier, Batch, Product, StockMovement, Supplier,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Batch lifecycle and the stock-movement ledger.
///
/// Batches are consumed in ascending expiry order so near-expiry stock
/// leaves first; every batch-level delta lands in the append-only ledger.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateBatchInput {
    pub product_id: Uuid,
    pub supplier_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub manufacturing_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub quality_passed: bool,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct DisposeBatchInput {
    pub quantity: i32,
    #[validate(length(min = 1))]
    pub reason: String,
    pub notes: Option<String>,
}

/// Greedy FIFO plan over `(batch_id, remaining)` pairs already sorted by
/// ascending expiry. Returns the per-batch consumptions, or the total
/// available quantity when it cannot cover `required`.
pub fn plan_fifo(batches: &[(Uuid, i32)], required: i32) -> Result<Vec<(Uuid, i32)>, i32> {
    let available: i32 = batches.iter().map(|(_, r)| (*r).max(0)).sum();
    if available < required {
        return Err(available);
    }

    let mut plan = Vec::new();
    let mut left = required;
    for (id, remaining) in batches {
        if left == 0 {
            break;
        }
        let take = left.min(*remaining);
        if take > 0 {
            plan.push((*id, take));
            left -= take;
        }
    }
    Ok(plan)
}

fn generate_batch_code(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("LOT-{}-{}", now.format("%Y%m%d"), suffix)
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Create a pending batch and bump the supplier's purchasing counters
    /// atomically in the same transaction.
    #[instrument(skip(self, input))]
    pub async fn create_batch(
        &self,
        staff_id: Uuid,
        input: CreateBatchInput,
    ) -> Result<batch::Model, ServiceError> {
        input.validate()?;
        let now = Utc::now();

        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }
        if input.unit_cost <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit_cost must be positive".to_string(),
            ));
        }
        if input.manufacturing_date.date_naive() > now.date_naive() {
            return Err(ServiceError::ValidationError(
                "manufacturing date cannot be in the future".to_string(),
            ));
        }
        if input.expiry_date <= input.manufacturing_date {
            return Err(ServiceError::ValidationError(
                "expiry date must be after the manufacturing date".to_string(),
            ));
        }
        if input.expiry_date.date_naive() <= now.date_naive() {
            return Err(ServiceError::ValidationError(
                "expiry date must be in the future".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let supplier = Supplier::find_by_id(input.supplier_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Supplier {} not found", input.supplier_id))
            })?;

        // Retry a few times on the (unlikely) generated-code collision.
        let mut batch_code = generate_batch_code(now);
        for _ in 0..3 {
            let taken = Batch::find()
                .filter(batch::Column::BatchCode.eq(batch_code.clone()))
                .one(&txn)
                .await?
                .is_some();
            if !taken {
                break;
            }
            batch_code = generate_batch_code(now);
        }

        let total_cost = input.unit_cost * Decimal::from(input.quantity);
        let model = batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_code: Set(batch_code),
            product_id: Set(input.product_id),
            supplier_id: Set(input.supplier_id),
            quantity: Set(input.quantity),
            remaining_quantity: Set(input.quantity),
            unit_cost: Set(input.unit_cost),
            manufacturing_date: Set(input.manufacturing_date),
            expiry_date: Set(input.expiry_date),
            status: Set(BatchStatus::Pending),
            location: Set(input.location),
            quality_passed: Set(input.quality_passed),
            quality_checked_by: Set(input.quality_passed.then_some(staff_id)),
            quality_checked_at: Set(input.quality_passed.then_some(now)),
            approved_by: Set(None),
            approved_at: Set(None),
            notes: Set(input.notes),
            created_by: Set(staff_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        // Purchasing counters: atomic increments, not read-modify-write.
        Supplier::update_many()
            .col_expr(
                supplier::Column::TotalOrders,
                Expr::col(supplier::Column::TotalOrders).add(1),
            )
            .col_expr(
                supplier::Column::TotalValue,
                Expr::col(supplier::Column::TotalValue).add(total_cost),
            )
            .filter(supplier::Column::Id.eq(supplier.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::BatchCreated(model.id))
            .await;
        info!(batch_id = %model.id, batch_code = %model.batch_code, "batch created");
        Ok(model)
    }

    /// Activate a pending batch. Requires a passed quality check; books
    /// the purchase into the ledger and onto the product counter.
    #[instrument(skip(self))]
    pub async fn approve_batch(
        &self,
        staff_id: Uuid,
        batch_id: Uuid,
    ) -> Result<batch::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let batch = Self::find_batch_for_update(&txn, batch_id).await?;

        if !matches!(batch.status, BatchStatus::Pending | BatchStatus::Received) {
            return Err(ServiceError::InvalidOperation(format!(
                "batch {} cannot be approved from its current status",
                batch.batch_code
            )));
        }
        if !batch.quality_passed {
            return Err(ServiceError::ValidationError(
                "batch has not passed quality check".to_string(),
            ));
        }

        let now = Utc::now();
        let quantity = batch.quantity;
        let product_id = batch.product_id;
        let unit_cost = batch.unit_cost;

        let mut active: batch::ActiveModel = batch.into();
        active.status = Set(BatchStatus::Active);
        active.approved_by = Set(Some(staff_id));
        active.approved_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        Self::record_movement(
            &txn,
            MovementRecord {
                movement_type: MovementType::In,
                product_id,
                batch_id: Some(batch_id),
                quantity,
                unit_cost,
                reason: "purchase".to_string(),
                reference: Some((ReferenceKind::Batch, batch_id)),
                performed_by: staff_id,
            },
        )
        .await?;

        Product::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).add(quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::BatchApproved(batch_id))
            .await;
        info!(batch_id = %batch_id, quantity, "batch approved and activated");
        Ok(updated)
    }

    /// Destroy part or all of a batch's remainder.
    #[instrument(skip(self, input))]
    pub async fn dispose_batch(
        &self,
        staff_id: Uuid,
        batch_id: Uuid,
        input: DisposeBatchInput,
    ) -> Result<batch::Model, ServiceError> {
        input.validate()?;
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let batch = Self::find_batch_for_update(&txn, batch_id).await?;

        if input.quantity > batch.remaining_quantity {
            return Err(ServiceError::ValidationError(format!(
                "cannot dispose {} units; only {} remaining",
                input.quantity, batch.remaining_quantity
            )));
        }

        let now = Utc::now();
        let remaining = batch.remaining_quantity - input.quantity;
        let product_id = batch.product_id;
        let unit_cost = batch.unit_cost;

        let mut active: batch::ActiveModel = batch.into();
        active.remaining_quantity = Set(remaining);
        if remaining == 0 {
            active.status = Set(BatchStatus::Disposed);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        Self::record_movement(
            &txn,
            MovementRecord {
                movement_type: MovementType::Disposal,
                product_id,
                batch_id: Some(batch_id),
                quantity: -input.quantity,
                unit_cost,
                reason: input.reason,
                reference: Some((ReferenceKind::Batch, batch_id)),
                performed_by: staff_id,
            },
        )
        .await?;

        let affected = Product::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).sub(input.quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::StockQuantity.gte(input.quantity))
            .exec(&txn)
            .await?;
        if affected.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "product counter cannot cover disposal of {} units",
                input.quantity
            )));
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::BatchDisposed {
                batch_id,
                quantity: input.quantity,
            })
            .await;
        info!(batch_id = %batch_id, quantity = input.quantity, "batch stock disposed");
        Ok(updated)
    }

    /// Consume `quantity` units for an order inside the caller's
    /// transaction: guarded product decrement, then FIFO over the active
    /// batches (skipping expired ones) with a ledger row per consumption.
    /// Nothing persists on shortfall because the caller's transaction
    /// aborts with the returned error.
    pub async fn deduct_for_order<C: ConnectionTrait>(
        conn: &C,
        product_id: Uuid,
        quantity: i32,
        order_id: Uuid,
        performed_by: Uuid,
    ) -> Result<(), ServiceError> {
        let affected = Product::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).sub(quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::StockQuantity.gte(quantity))
            .exec(conn)
            .await?;
        if affected.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "product {product_id} cannot cover {quantity} units"
            )));
        }

        let now = Utc::now();
        let mut query = Batch::find()
            .filter(batch::Column::ProductId.eq(product_id))
            .filter(batch::Column::Status.eq(BatchStatus::Active))
            .filter(batch::Column::RemainingQuantity.gt(0))
            .filter(batch::Column::ExpiryDate.gt(now))
            // Deterministic lock order: expiry then id, so concurrent
            // allocations touch batch rows in the same sequence.
            .order_by_asc(batch::Column::ExpiryDate)
            .order_by_asc(batch::Column::Id);
        if conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        let batches = query.all(conn).await?;

        if batches.is_empty() {
            // Products not yet tracked at batch level only move the counter.
            let tracked = Batch::find()
                .filter(batch::Column::ProductId.eq(product_id))
                .count(conn)
                .await?
                > 0;
            if !tracked {
                return Ok(());
            }
            return Err(ServiceError::InsufficientStock(format!(
                "no unexpired batch stock for product {product_id}"
            )));
        }

        let pairs: Vec<(Uuid, i32)> = batches
            .iter()
            .map(|b| (b.id, b.remaining_quantity))
            .collect();
        let plan = plan_fifo(&pairs, quantity).map_err(|available| {
            ServiceError::InsufficientStock(format!(
                "only {available} unexpired units in batches for product {product_id}"
            ))
        })?;

        for (batch_id, take) in plan {
            let batch = batches
                .iter()
                .find(|b| b.id == batch_id)
                .expect("planned batch comes from the fetched set");

            Batch::update_many()
                .col_expr(
                    batch::Column::RemainingQuantity,
                    Expr::col(batch::Column::RemainingQuantity).sub(take),
                )
                .col_expr(batch::Column::UpdatedAt, Expr::value(now))
                .filter(batch::Column::Id.eq(batch_id))
                .exec(conn)
                .await?;

            Self::record_movement(
                conn,
                MovementRecord {
                    movement_type: MovementType::Out,
                    product_id,
                    batch_id: Some(batch_id),
                    quantity: -take,
                    unit_cost: batch.unit_cost,
                    reason: "sale".to_string(),
                    reference: Some((ReferenceKind::Order, order_id)),
                    performed_by,
                },
            )
            .await?;
        }

        Ok(())
    }

    /// Reverse an order's consumption inside the caller's transaction:
    /// product counter back up, then the net-consumed quantities returned
    /// to their batches (latest expiry first) with `return` ledger rows.
    pub async fn restore_for_order<C: ConnectionTrait>(
        conn: &C,
        product_id: Uuid,
        quantity: i32,
        order_id: Uuid,
        performed_by: Uuid,
    ) -> Result<(), ServiceError> {
        Product::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).add(quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .exec(conn)
            .await?;

        let movements = StockMovement::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .filter(stock_movement::Column::ReferenceType.eq(ReferenceKind::Order))
            .filter(stock_movement::Column::ReferenceId.eq(order_id))
            .all(conn)
            .await?;
        if movements.is_empty() {
            return Ok(());
        }

        // Net consumption per batch: sales minus returns already booked.
        let mut consumed: Vec<(Uuid, i32)> = Vec::new();
        for m in &movements {
            let Some(batch_id) = m.batch_id else { continue };
            let delta = match m.movement_type {
                MovementType::Out => -m.quantity,
                MovementType::Return => -m.quantity,
                _ => 0,
            };
            match consumed.iter_mut().find(|(id, _)| *id == batch_id) {
                Some((_, q)) => *q += delta,
                None => consumed.push((batch_id, delta)),
            }
        }

        let batch_ids: Vec<Uuid> = consumed.iter().map(|(id, _)| *id).collect();
        let mut batches = Batch::find()
            .filter(batch::Column::Id.is_in(batch_ids))
            .all(conn)
            .await?;
        // Give back latest-expiry first, mirroring FIFO consumption.
        batches.sort_by(|a, b| b.expiry_date.cmp(&a.expiry_date).then(b.id.cmp(&a.id)));

        let now = Utc::now();
        let mut left = quantity;
        for b in batches {
            if left == 0 {
                break;
            }
            let net = consumed
                .iter()
                .find(|(id, _)| *id == b.id)
                .map(|(_, q)| *q)
                .unwrap_or(0);
            let give_back = left.min(net.max(0));
            if give_back == 0 {
                continue;
            }

            Batch::update_many()
                .col_expr(
                    batch::Column::RemainingQuantity,
                    Expr::col(batch::Column::RemainingQuantity).add(give_back),
                )
                .col_expr(batch::Column::UpdatedAt, Expr::value(now))
                .filter(batch::Column::Id.eq(b.id))
                .exec(conn)
                .await?;

            Self::record_movement(
                conn,
                MovementRecord {
                    movement_type: MovementType::Return,
                    product_id,
                    batch_id: Some(b.id),
                    quantity: give_back,
                    unit_cost: b.unit_cost,
                    reason: "order cancelled".to_string(),
                    reference: Some((ReferenceKind::Order, order_id)),
                    performed_by,
                },
            )
            .await?;
            left -= give_back;
        }

        if left > 0 {
            warn!(
                product_id = %product_id,
                unreturned = left,
                "restore exceeded batch-tracked consumption; counter restored in full"
            );
        }
        Ok(())
    }

    async fn record_movement<C: ConnectionTrait>(
        conn: &C,
        record: MovementRecord,
    ) -> Result<(), ServiceError> {
        let (reference_type, reference_id) = match record.reference {
            Some((kind, id)) => (Some(kind), Some(id)),
            None => (None, None),
        };
        stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            movement_type: Set(record.movement_type),
            product_id: Set(record.product_id),
            batch_id: Set(record.batch_id),
            quantity: Set(record.quantity),
            unit_cost: Set(record.unit_cost),
            total_value: Set(record.unit_cost * Decimal::from(record.quantity.abs())),
            reason: Set(record.reason),
            reference_type: Set(reference_type),
            reference_id: Set(reference_id),
            location: Set(None),
            performed_by: Set(record.performed_by),
            approved_by: Set(None),
            status: Set(MovementStatus::Completed),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;
        Ok(())
    }

    async fn find_batch_for_update<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
    ) -> Result<batch::Model, ServiceError> {
        let mut query = Batch::find_by_id(batch_id);
        if conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        query
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Batch {batch_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn get_batch(&self, batch_id: Uuid) -> Result<batch::Model, ServiceError> {
        Batch::find_by_id(batch_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Batch {batch_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn list_batches(
        &self,
        page: u64,
        limit: u64,
        product_id: Option<Uuid>,
        status: Option<BatchStatus>,
    ) -> Result<(Vec<batch::Model>, u64), ServiceError> {
        let mut query = Batch::find().order_by_desc(batch::Column::CreatedAt);
        if let Some(product_id) = product_id {
            query = query.filter(batch::Column::ProductId.eq(product_id));
        }
        if let Some(status) = status {
            query = query.filter(batch::Column::Status.eq(status));
        }

        let paginator = query.paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await?;
        let batches = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((batches, total))
    }

    /// Active batches expiring within `days`, soonest first.
    #[instrument(skip(self))]
    pub async fn expiring_soon(&self, days: i64) -> Result<Vec<batch::Model>, ServiceError> {
        let now = Utc::now();
        let horizon = now + Duration::days(days);
        let batches = Batch::find()
            .filter(batch::Column::Status.eq(BatchStatus::Active))
            .filter(batch::Column::RemainingQuantity.gt(0))
            .filter(batch::Column::ExpiryDate.gt(now))
            .filter(batch::Column::ExpiryDate.lte(horizon))
            .order_by_asc(batch::Column::ExpiryDate)
            .all(&*self.db)
            .await?;
        Ok(batches)
    }

    /// Active batches already past expiry with stock still on hand.
    #[instrument(skip(self))]
    pub async fn expired(&self) -> Result<Vec<batch::Model>, ServiceError> {
        let batches = Batch::find()
            .filter(batch::Column::Status.eq(BatchStatus::Active))
            .filter(batch::Column::RemainingQuantity.gt(0))
            .filter(batch::Column::ExpiryDate.lt(Utc::now()))
            .order_by_asc(batch::Column::ExpiryDate)
            .all(&*self.db)
            .await?;
        Ok(batches)
    }

    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        page: u64,
        limit: u64,
        product_id: Option<Uuid>,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let mut query = StockMovement::find().order_by_desc(stock_movement::Column::CreatedAt);
        if let Some(product_id) = product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }

        let paginator = query.paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await?;
        let movements = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((movements, total))
    }
}

struct MovementRecord {
    movement_type: MovementType,
    product_id: Uuid,
    batch_id: Option<Uuid>,
    quantity: i32,
    unit_cost: Decimal,
    reason: String,
    reference: Option<(ReferenceKind, Uuid)>,
    performed_by: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_consumes_earliest_batches_first() {
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();
        let plan = plan_fifo(&[(b1, 3), (b2, 5)], 4).unwrap();
        assert_eq!(plan, vec![(b1, 3), (b2, 1)]);
    }

    #[test]
    fn fifo_exact_fit_takes_one_batch() {
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();
        let plan = plan_fifo(&[(b1, 4), (b2, 5)], 4).unwrap();
        assert_eq!(plan, vec![(b1, 4)]);
    }

    #[test]
    fn fifo_shortfall_reports_available() {
        let b1 = Uuid::new_v4();
        assert_eq!(plan_fifo(&[(b1, 3)], 5), Err(3));
        assert_eq!(plan_fifo(&[], 1), Err(0));
    }

    #[test]
    fn fifo_skips_empty_batches() {
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();
        let plan = plan_fifo(&[(b1, 0), (b2, 5)], 2).unwrap();
        assert_eq!(plan, vec![(b2, 2)]);
    }

    #[test]
    fn batch_code_shape() {
        let code = generate_batch_code(Utc::now());
        assert!(code.starts_with("LOT-"));
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 4);
    }
}
