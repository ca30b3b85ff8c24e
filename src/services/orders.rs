use crate::{
    entities::{
        order::{self, OrderStatus, PaymentMethod, PaymentStatus},
        order_detail, product, Order, OrderDetail, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{carts::CartService, catalog::effective_sale, inventory::InventoryService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;

/// Owner of the order state machine and the only writer of stock deltas
/// for non-online orders.
///
/// Every transition runs inside one transaction holding an exclusive lock
/// on the order row, so a customer cancel can never race a staff update:
/// whichever commits first wins and the loser observes the new state.
/// `stock_deducted` flips in the same transaction as the product updates,
/// which is what makes the deduction at-most-once.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    shipping_fee: Decimal,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<CreateOrderItem>,
    #[validate(length(min = 1))]
    pub recipient_name: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateOrderStatusInput {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderWithDetails {
    pub order: order::Model,
    pub details: Vec<order_detail::Model>,
}

#[derive(Debug, Serialize)]
pub struct OrderStats {
    pub total_orders: u64,
    pub pending: u64,
    pub processing: u64,
    pub shipping: u64,
    pub delivered: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub revenue: Decimal,
    pub recent: Vec<order::Model>,
}

/// Stock effect of a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAction {
    Deduct,
    Restore,
    None,
}

/// Decide the stock effect of moving `current → target`.
///
/// Online orders are settled by the payment webhook, which owns their
/// deduction; staff transitions for them never move stock. Cancellation
/// restores whenever a deduction happened, regardless of method.
pub fn stock_action(
    method: PaymentMethod,
    current: OrderStatus,
    target: OrderStatus,
    stock_deducted: bool,
) -> StockAction {
    if target == OrderStatus::Cancelled {
        return if stock_deducted {
            StockAction::Restore
        } else {
            StockAction::None
        };
    }
    if method.settles_via_webhook() {
        return StockAction::None;
    }

    let forward = current == OrderStatus::Pending && target.rank() > Some(0);
    let backward = current.rank() > Some(0) && target == OrderStatus::Pending;

    if forward && !stock_deducted {
        StockAction::Deduct
    } else if backward && stock_deducted {
        StockAction::Restore
    } else {
        StockAction::None
    }
}

/// Payment status promoted automatically by fulfilment progress.
pub fn payment_promotion(method: PaymentMethod, target: OrderStatus) -> Option<PaymentStatus> {
    match (method, target) {
        (PaymentMethod::Cod, OrderStatus::Delivered) => Some(PaymentStatus::Success),
        (PaymentMethod::Cash | PaymentMethod::Bank, OrderStatus::Completed) => {
            Some(PaymentStatus::Success)
        }
        _ => None,
    }
}

/// Which order lines a transition may move stock for.
#[derive(Debug, Clone, Copy)]
enum StockScope {
    All,
    CreatedBy(Uuid),
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, shipping_fee: Decimal) -> Self {
        Self {
            db,
            event_sender,
            shipping_fee,
        }
    }

    async fn find_order_for_update<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let mut query = Order::find_by_id(order_id);
        if conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        query
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))
    }

    /// Create a pending order from an explicit item list and clear the
    /// customer's cart. The stock check here is best-effort visibility,
    /// not a reservation; deduction happens on transition or webhook.
    #[instrument(skip(self, input), fields(customer_id = %customer.user_id))]
    pub async fn create_order(
        &self,
        customer: &AuthUser,
        input: CreateOrderInput,
    ) -> Result<OrderWithDetails, ServiceError> {
        input.validate()?;
        for (idx, item) in input.items.iter().enumerate() {
            if item.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "items[{idx}].quantity must be at least 1"
                )));
            }
        }

        let txn = self.db.begin().await?;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let mut subtotal = Decimal::ZERO;
        let mut details = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = Product::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            if product.stock_quantity < item.quantity {
                return Err(ServiceError::ValidationError(format!(
                    "insufficient stock for {}: {} available",
                    product.name, product.stock_quantity
                )));
            }

            let unit_price =
                effective_sale(product.price, product.sale_price, product.expiry_date, now)
                    .unwrap_or(product.price);
            subtotal += unit_price * Decimal::from(item.quantity);

            details.push(order_detail::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name),
                quantity: Set(item.quantity),
                unit_price: Set(unit_price),
                created_at: Set(now),
            });
        }

        let order = order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(Some(customer.user_id)),
            recipient_name: Set(input.recipient_name),
            phone: Set(input.phone),
            shipping_address: Set(input.shipping_address),
            note: Set(input.note),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            payment_method: Set(input.payment_method),
            subtotal: Set(subtotal),
            shipping_fee: Set(self.shipping_fee),
            total_amount: Set(subtotal + self.shipping_fee),
            cancel_reason: Set(None),
            stock_deducted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut inserted = Vec::with_capacity(details.len());
        for detail in details {
            inserted.push(detail.insert(&txn).await?);
        }

        CartService::clear_for_customer(&txn, customer.user_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        info!(order_id = %order_id, total = %order.total_amount, "order created");

        Ok(OrderWithDetails {
            order,
            details: inserted,
        })
    }

    /// Customer-initiated cancel, allowed only while pending.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        customer: &AuthUser,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderWithDetails, ServiceError> {
        let txn = self.db.begin().await?;
        let order = Self::find_order_for_update(&txn, order_id).await?;

        if order.customer_id != Some(customer.user_id) {
            return Err(ServiceError::Forbidden(
                "Order belongs to another customer".to_string(),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidOperation(
                "only pending orders can be cancelled".to_string(),
            ));
        }

        let details = OrderDetail::find()
            .filter(order_detail::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        if order.stock_deducted {
            for detail in &details {
                InventoryService::restore_for_order(
                    &txn,
                    detail.product_id,
                    detail.quantity,
                    order_id,
                    customer.user_id,
                )
                .await?;
            }
        }

        let was_deducted = order.stock_deducted;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.payment_status = Set(PaymentStatus::Cancelled);
        active.cancel_reason =
            Set(Some(reason.unwrap_or_else(|| "Cancelled by customer".to_string())));
        active.stock_deducted = Set(false);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        txn.commit().await?;

        if was_deducted {
            self.event_sender
                .send_or_log(Event::StockRestored { order_id })
                .await;
        }
        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        info!(order_id = %order_id, "order cancelled by customer");

        Ok(OrderWithDetails { order, details })
    }

    /// Full staff/admin transition: the authoritative path.
    #[instrument(skip(self, input), fields(caller = %caller.user_id))]
    pub async fn update_status(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
        input: UpdateOrderStatusInput,
    ) -> Result<OrderWithDetails, ServiceError> {
        self.transition(caller, order_id, input, StockScope::All)
            .await
    }

    /// Per-product staff transition: stock deltas touch only the lines
    /// whose product the caller created; the flag still flips globally.
    #[instrument(skip(self, input), fields(caller = %caller.user_id))]
    pub async fn update_status_scoped(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
        input: UpdateOrderStatusInput,
    ) -> Result<OrderWithDetails, ServiceError> {
        self.transition(
            caller,
            order_id,
            input,
            StockScope::CreatedBy(caller.user_id),
        )
        .await
    }

    async fn transition(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
        input: UpdateOrderStatusInput,
        scope: StockScope,
    ) -> Result<OrderWithDetails, ServiceError> {
        let txn = self.db.begin().await?;
        let order = Self::find_order_for_update(&txn, order_id).await?;

        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidStatus(
                "cancelled orders cannot change status".to_string(),
            ));
        }
        if input.status == OrderStatus::Cancelled && input.cancel_reason.is_none() {
            return Err(ServiceError::ValidationError(
                "cancel_reason is required when cancelling".to_string(),
            ));
        }

        let details = OrderDetail::find()
            .filter(order_detail::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        let action = stock_action(
            order.payment_method,
            order.status,
            input.status,
            order.stock_deducted,
        );

        let scoped: Vec<&order_detail::Model> = match scope {
            StockScope::All => details.iter().collect(),
            StockScope::CreatedBy(staff_id) => {
                let mut owned = Vec::new();
                for detail in &details {
                    let product = Product::find_by_id(detail.product_id)
                        .one(&txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Product {} no longer exists",
                                detail.product_id
                            ))
                        })?;
                    if product.created_by == staff_id {
                        owned.push(detail);
                    }
                }
                owned
            }
        };

        match action {
            StockAction::Deduct => {
                for detail in &scoped {
                    // A vanished product aborts the whole transition.
                    Product::find_by_id(detail.product_id)
                        .one(&txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Product {} no longer exists",
                                detail.product_id
                            ))
                        })?;
                    InventoryService::deduct_for_order(
                        &txn,
                        detail.product_id,
                        detail.quantity,
                        order_id,
                        caller.user_id,
                    )
                    .await?;
                }
            }
            StockAction::Restore => {
                for detail in &scoped {
                    InventoryService::restore_for_order(
                        &txn,
                        detail.product_id,
                        detail.quantity,
                        order_id,
                        caller.user_id,
                    )
                    .await?;
                }
            }
            StockAction::None => {}
        }

        let old_status = order.status;
        let method = order.payment_method;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(input.status);
        if let Some(note) = input.note {
            active.note = Set(Some(note));
        }
        match action {
            StockAction::Deduct => active.stock_deducted = Set(true),
            StockAction::Restore => active.stock_deducted = Set(false),
            StockAction::None => {}
        }
        if input.status == OrderStatus::Cancelled {
            active.payment_status = Set(PaymentStatus::Cancelled);
            active.cancel_reason = Set(input.cancel_reason);
        } else if let Some(promoted) = payment_promotion(method, input.status) {
            active.payment_status = Set(promoted);
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        txn.commit().await?;

        match action {
            StockAction::Deduct => {
                self.event_sender
                    .send_or_log(Event::StockDeducted { order_id })
                    .await;
            }
            StockAction::Restore => {
                self.event_sender
                    .send_or_log(Event::StockRestored { order_id })
                    .await;
            }
            StockAction::None => {}
        }
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: format!("{old_status:?}").to_lowercase(),
                new_status: format!("{:?}", order.status).to_lowercase(),
            })
            .await;
        info!(order_id = %order_id, from = ?old_status, to = ?order.status, "order status updated");

        Ok(OrderWithDetails { order, details })
    }

    /// Manual payment-status override for non-online methods.
    #[instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_id: Uuid,
        payment_status: PaymentStatus,
        note: Option<String>,
    ) -> Result<OrderWithDetails, ServiceError> {
        let txn = self.db.begin().await?;
        let order = Self::find_order_for_update(&txn, order_id).await?;

        if order.payment_method.settles_via_webhook() {
            return Err(ServiceError::InvalidOperation(
                "online payments are settled by the provider webhook".to_string(),
            ));
        }

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(payment_status);
        if let Some(note) = note {
            active.note = Set(Some(note));
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        let details = OrderDetail::find()
            .filter(order_detail::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        txn.commit().await?;

        Ok(OrderWithDetails { order, details })
    }

    /// Orders visible to the caller: customers see their own; staff see
    /// orders containing at least one product they created, with the
    /// detail rows filtered down to those products.
    #[instrument(skip(self))]
    pub async fn my_orders(
        &self,
        caller: &AuthUser,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderWithDetails>, u64), ServiceError> {
        if caller.is_staff() {
            let owned_products: Vec<Uuid> = Product::find()
                .filter(product::Column::CreatedBy.eq(caller.user_id))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect();

            let order_ids: Vec<Uuid> = OrderDetail::find()
                .filter(order_detail::Column::ProductId.is_in(owned_products.clone()))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|d| d.order_id)
                .collect();

            let paginator = Order::find()
                .filter(order::Column::Id.is_in(order_ids))
                .order_by_desc(order::Column::CreatedAt)
                .paginate(&*self.db, limit.max(1));
            let total = paginator.num_items().await?;
            let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

            let mut out = Vec::with_capacity(orders.len());
            for order in orders {
                let details = OrderDetail::find()
                    .filter(order_detail::Column::OrderId.eq(order.id))
                    .filter(order_detail::Column::ProductId.is_in(owned_products.clone()))
                    .all(&*self.db)
                    .await?;
                out.push(OrderWithDetails { order, details });
            }
            Ok((out, total))
        } else {
            let paginator = Order::find()
                .filter(order::Column::CustomerId.eq(caller.user_id))
                .order_by_desc(order::Column::CreatedAt)
                .paginate(&*self.db, limit.max(1));
            let total = paginator.num_items().await?;
            let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

            let mut out = Vec::with_capacity(orders.len());
            for order in orders {
                let details = OrderDetail::find()
                    .filter(order_detail::Column::OrderId.eq(order.id))
                    .all(&*self.db)
                    .await?;
                out.push(OrderWithDetails { order, details });
            }
            Ok((out, total))
        }
    }

    /// Single order with the ownership predicate applied per role.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderWithDetails, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let details = OrderDetail::find()
            .filter(order_detail::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        if caller.is_admin() {
            return Ok(OrderWithDetails { order, details });
        }

        if caller.is_staff() {
            let owned_products: Vec<Uuid> = Product::find()
                .filter(product::Column::CreatedBy.eq(caller.user_id))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect();
            let filtered: Vec<order_detail::Model> = details
                .into_iter()
                .filter(|d| owned_products.contains(&d.product_id))
                .collect();
            if filtered.is_empty() {
                return Err(ServiceError::Forbidden(
                    "Order contains none of your products".to_string(),
                ));
            }
            return Ok(OrderWithDetails {
                order,
                details: filtered,
            });
        }

        if order.customer_id != Some(caller.user_id) {
            return Err(ServiceError::Forbidden(
                "Order belongs to another customer".to_string(),
            ));
        }
        Ok(OrderWithDetails { order, details })
    }

    /// Paginated management listing with optional status filters.
    #[instrument(skip(self))]
    pub async fn manage(
        &self,
        status: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Order::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(payment_status) = payment_status {
            query = query.filter(order::Column::PaymentStatus.eq(payment_status));
        }

        let paginator = query.paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Operational totals for the dashboard.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<OrderStats, ServiceError> {
        let count_for = |status: OrderStatus| {
            Order::find()
                .filter(order::Column::Status.eq(status))
                .count(&*self.db)
        };

        let total_orders = Order::find().count(&*self.db).await?;
        let (pending, processing, shipping, delivered, completed, cancelled) = tokio::try_join!(
            count_for(OrderStatus::Pending),
            count_for(OrderStatus::Processing),
            count_for(OrderStatus::Shipping),
            count_for(OrderStatus::Delivered),
            count_for(OrderStatus::Completed),
            count_for(OrderStatus::Cancelled),
        )?;

        #[derive(FromQueryResult)]
        struct RevenueRow {
            revenue: Option<Decimal>,
        }
        let revenue = Order::find()
            .select_only()
            .column_as(order::Column::TotalAmount.sum(), "revenue")
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Success))
            .into_model::<RevenueRow>()
            .one(&*self.db)
            .await?
            .and_then(|r| r.revenue)
            .unwrap_or(Decimal::ZERO);

        let recent = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .limit(5)
            .all(&*self.db)
            .await?;

        Ok(OrderStats {
            total_orders,
            pending,
            processing,
            shipping,
            delivered,
            completed,
            cancelled,
            revenue,
            recent,
        })
    }
}
