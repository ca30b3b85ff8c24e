use crate::{
    auth::AuthUser,
    entities::{
        order::{self, OrderStatus, PaymentStatus},
        payment::{self, PaymentState},
        order_detail, Order, OrderDetail, Payment, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        carts::CartService,
        inventory::InventoryService,
        provider::{CheckoutItem, CheckoutProvider, CheckoutRequest, ProviderPaymentStatus},
    },
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Adapter between orders and the hosted-checkout provider.
///
/// Reconciliation is idempotent on `provider_order_code`: a replayed
/// webhook finds the payment already terminal and acknowledges without
/// touching stock. All success-path updates share one transaction so a
/// partial failure can never leave stock deducted without
/// `payment_status = success`.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    provider: Arc<dyn CheckoutProvider>,
    link_timeout_secs: i64,
    stale_after_mins: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentLinkResponse {
    pub payment_id: Uuid,
    pub payment_url: String,
}

/// Provider webhook payload. `code == "00"` means the payment settled.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub code: Option<String>,
    pub desc: Option<String>,
    pub data: Option<WebhookData>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    #[serde(rename = "orderCode")]
    pub order_code: i64,
    #[serde(rename = "transactionDateTime")]
    pub transaction_date_time: Option<String>,
    pub reference: Option<String>,
}

/// Outcome reported back to the provider; every variant maps to 200 so
/// the provider stops retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAck {
    Processed,
    MarkedFailed,
    AlreadyProcessed,
    UnknownOrderCode,
    Ignored,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        provider: Arc<dyn CheckoutProvider>,
        link_timeout_secs: i64,
        stale_after_mins: i64,
    ) -> Self {
        Self {
            db,
            event_sender,
            provider,
            link_timeout_secs,
            stale_after_mins,
        }
    }

    /// Allocate a provider order code unique among non-terminal payments.
    /// The epoch-millisecond tail is monotonic enough; collisions bump
    /// until a free code is found.
    async fn allocate_order_code<C: ConnectionTrait>(conn: &C) -> Result<i64, ServiceError> {
        let mut code = Utc::now().timestamp_millis() % 1_000_000_000;
        loop {
            let taken = Payment::find()
                .filter(payment::Column::ProviderOrderCode.eq(code))
                .filter(payment::Column::Status.eq(PaymentState::Pending))
                .one(conn)
                .await?
                .is_some();
            if !taken {
                return Ok(code);
            }
            code += 1;
        }
    }

    /// Create (or reuse) a hosted-checkout session for the caller's order.
    #[instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn create_payment(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
    ) -> Result<PaymentLinkResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        if order.customer_id != Some(caller.user_id) {
            return Err(ServiceError::Forbidden(
                "Order belongs to another customer".to_string(),
            ));
        }
        if !matches!(
            order.payment_method,
            order::PaymentMethod::Online | order::PaymentMethod::Bank
        ) {
            return Err(ServiceError::InvalidOperation(
                "order is not payable through the checkout provider".to_string(),
            ));
        }

        let now = Utc::now();

        // A young pending payment the provider still considers PENDING is
        // reused; anything else is marked failed before a new attempt.
        if let Some(existing) = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .filter(payment::Column::Status.eq(PaymentState::Pending))
            .one(&*self.db)
            .await?
        {
            let age = now - existing.created_at;
            if age < Duration::minutes(self.stale_after_mins) {
                let provider_state = self
                    .provider
                    .payment_status(existing.provider_order_code)
                    .await
                    .unwrap_or(ProviderPaymentStatus::Expired);
                if provider_state == ProviderPaymentStatus::Pending {
                    if let Some(url) = existing.payment_url.clone() {
                        info!(payment_id = %existing.id, "reusing pending payment link");
                        return Ok(PaymentLinkResponse {
                            payment_id: existing.id,
                            payment_url: url,
                        });
                    }
                }
            }

            let mut stale: payment::ActiveModel = existing.into();
            stale.status = Set(PaymentState::Failed);
            stale.cancelled_at = Set(Some(now));
            stale.update(&*self.db).await?;
        }

        // Build the item list from the order lines, dropping rows that
        // can no longer be charged; an empty result aborts.
        let details = OrderDetail::find()
            .filter(order_detail::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        let mut items = Vec::new();
        let mut subtotal = Decimal::ZERO;
        for detail in &details {
            if detail.quantity <= 0 || detail.unit_price <= Decimal::ZERO {
                continue;
            }
            if Product::find_by_id(detail.product_id)
                .one(&*self.db)
                .await?
                .is_none()
            {
                continue;
            }
            subtotal += detail.unit_price * Decimal::from(detail.quantity);
            items.push(CheckoutItem {
                name: detail.product_name.clone(),
                quantity: detail.quantity,
                price: detail.unit_price,
            });
        }
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "order has no payable items".to_string(),
            ));
        }

        let amount = subtotal + order.shipping_fee;
        let order_code = Self::allocate_order_code(&*self.db).await?;

        let session = self
            .provider
            .create_payment_link(&CheckoutRequest {
                order_code,
                amount,
                description: format!("GLOWCART {order_code}"),
                items,
            })
            .await?;

        let model = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            user_id: Set(caller.user_id),
            amount: Set(amount),
            subtotal: Set(subtotal),
            shipping_fee: Set(order.shipping_fee),
            provider_order_code: Set(order_code),
            status: Set(PaymentState::Pending),
            payment_url: Set(Some(session.checkout_url.clone())),
            payment_timeout: Set(Some(now + Duration::seconds(self.link_timeout_secs))),
            is_expired: Set(false),
            transaction_id: Set(None),
            paid_at: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::PaymentLinkCreated {
                payment_id: model.id,
                order_id,
            })
            .await;
        info!(payment_id = %model.id, order_code, "payment link created");

        Ok(PaymentLinkResponse {
            payment_id: model.id,
            payment_url: session.checkout_url,
        })
    }

    /// Apply a provider webhook. Replay-safe and tolerant of probes.
    #[instrument(skip(self, payload))]
    pub async fn reconcile(&self, payload: WebhookPayload) -> Result<WebhookAck, ServiceError> {
        let (Some(code), Some(data)) = (payload.code.as_deref(), payload.data.as_ref()) else {
            // Probe or malformed ping; acknowledge without side effects.
            return Ok(WebhookAck::Ignored);
        };

        let txn = self.db.begin().await?;

        let mut query = Payment::find()
            .filter(payment::Column::ProviderOrderCode.eq(data.order_code));
        if txn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        let Some(found) = query.one(&txn).await? else {
            info!(order_code = data.order_code, "webhook for unknown order code");
            return Ok(WebhookAck::UnknownOrderCode);
        };

        if found.status.is_terminal() {
            info!(payment_id = %found.id, "webhook replay for terminal payment");
            return Ok(WebhookAck::AlreadyProcessed);
        }

        let now = Utc::now();
        let payment_id = found.id;
        let order_id = found.order_id;

        if code == "00" {
            let order = Self::find_order_for_update(&txn, order_id).await?;
            let user_id = found.user_id;

            // A cancel that won the race makes this a no-op: the payment
            // stays pending and the timeout sweep retires it.
            if order.status == OrderStatus::Cancelled {
                info!(payment_id = %payment_id, "webhook for cancelled order ignored");
                return Ok(WebhookAck::Ignored);
            }

            let transaction_id = data
                .reference
                .clone()
                .or_else(|| data.transaction_date_time.clone());
            let mut active: payment::ActiveModel = found.into();
            active.status = Set(PaymentState::Completed);
            active.transaction_id = Set(transaction_id);
            active.paid_at = Set(Some(now));
            active.update(&txn).await?;

            let details = OrderDetail::find()
                .filter(order_detail::Column::OrderId.eq(order_id))
                .all(&txn)
                .await?;

            if !order.stock_deducted {
                for detail in &details {
                    InventoryService::deduct_for_order(
                        &txn,
                        detail.product_id,
                        detail.quantity,
                        order_id,
                        user_id,
                    )
                    .await?;
                }
            }

            let mut order_active: order::ActiveModel = order.into();
            order_active.payment_status = Set(PaymentStatus::Success);
            order_active.stock_deducted = Set(true);
            order_active.updated_at = Set(now);
            order_active.update(&txn).await?;

            CartService::clear_for_customer(&txn, user_id).await?;

            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::PaymentCompleted {
                    payment_id,
                    order_id,
                })
                .await;
            info!(payment_id = %payment_id, "payment settled via webhook");
            Ok(WebhookAck::Processed)
        } else {
            let order = Self::find_order_for_update(&txn, order_id).await?;

            let mut active: payment::ActiveModel = found.into();
            active.status = Set(PaymentState::Failed);
            active.cancelled_at = Set(Some(now));
            active.update(&txn).await?;

            if order.status != OrderStatus::Cancelled {
                let mut order_active: order::ActiveModel = order.into();
                order_active.payment_status = Set(PaymentStatus::Failed);
                order_active.updated_at = Set(now);
                order_active.update(&txn).await?;
            }

            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::PaymentFailed {
                    payment_id,
                    order_id,
                })
                .await;
            warn!(payment_id = %payment_id, code, desc = ?payload.desc, "payment failed via webhook");
            Ok(WebhookAck::MarkedFailed)
        }
    }

    /// Mark every pending payment for the order failed. Pending payments
    /// never deducted stock, so there is nothing else to undo.
    #[instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn reset(&self, caller: &AuthUser, order_id: Uuid) -> Result<u64, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
        if order.customer_id != Some(caller.user_id) {
            return Err(ServiceError::Forbidden(
                "Order belongs to another customer".to_string(),
            ));
        }

        let now = Utc::now();
        let pending = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .filter(payment::Column::Status.eq(PaymentState::Pending))
            .all(&*self.db)
            .await?;

        let count = pending.len() as u64;
        for found in pending {
            let mut active: payment::ActiveModel = found.into();
            active.status = Set(PaymentState::Failed);
            active.cancelled_at = Set(Some(now));
            active.update(&*self.db).await?;
        }

        info!(order_id = %order_id, count, "pending payments reset");
        Ok(count)
    }

    /// Background sweep: pending payments past their timeout fail with
    /// `is_expired`. At-least-once safe; a second pass finds nothing.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self) -> Result<u64, ServiceError> {
        let now = Utc::now();
        let stale = Payment::find()
            .filter(payment::Column::Status.eq(PaymentState::Pending))
            .filter(payment::Column::PaymentTimeout.lt(now))
            .all(&*self.db)
            .await?;

        let mut expired = 0u64;
        for found in stale {
            let payment_id = found.id;
            let mut active: payment::ActiveModel = found.into();
            active.status = Set(PaymentState::Failed);
            active.is_expired = Set(true);
            active.update(&*self.db).await?;
            expired += 1;

            self.event_sender
                .send_or_log(Event::PaymentExpired(payment_id))
                .await;
        }

        if expired > 0 {
            info!(expired, "expired stale payment links");
        }
        Ok(expired)
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_payload_deserializes_provider_shape() {
        let json = r#"{
            "code": "00",
            "desc": "success",
            "data": {
                "orderCode": 123456789,
                "transactionDateTime": "2026-01-12 10:30:00",
                "reference": "FT1234"
            },
            "signature": "abc"
        }"#;
        let payload: WebhookPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.code.as_deref(), Some("00"));
        let data = payload.data.unwrap();
        assert_eq!(data.order_code, 123456789);
        assert_eq!(data.reference.as_deref(), Some("FT1234"));
    }

    #[test]
    fn empty_webhook_body_is_tolerated() {
        let payload: WebhookPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.code.is_none());
        assert!(payload.data.is_none());
    }
}
