mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use glowcart_api::{
    entities::{
        order::{OrderStatus, PaymentMethod, PaymentStatus},
        payment::{self, PaymentState},
        user::UserRole,
        Payment, Product,
    },
    errors::ServiceError,
    services::{
        orders::{CreateOrderInput, CreateOrderItem},
        payments::{WebhookAck, WebhookData, WebhookPayload},
    },
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

async fn seed_online_order(
    app: &TestApp,
    customer: &glowcart_api::auth::AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> Uuid {
    app.state
        .services
        .orders
        .create_order(
            customer,
            CreateOrderInput {
                items: vec![CreateOrderItem {
                    product_id,
                    quantity,
                }],
                recipient_name: "Linh Tran".to_string(),
                phone: "0901234567".to_string(),
                shipping_address: "12 Hang Bai, Hanoi".to_string(),
                payment_method: PaymentMethod::Online,
                note: None,
            },
        )
        .await
        .unwrap()
        .order
        .id
}

fn success_payload(order_code: i64) -> WebhookPayload {
    WebhookPayload {
        code: Some("00".to_string()),
        desc: Some("success".to_string()),
        data: Some(WebhookData {
            order_code,
            transaction_date_time: Some("2026-01-12 10:30:00".to_string()),
            reference: Some("FT9876".to_string()),
        }),
        signature: None,
    }
}

#[tokio::test]
async fn create_payment_persists_a_pending_attempt() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;
    let order_id = seed_online_order(&app, &customer, product.id, 2).await;

    let link = app
        .state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();
    assert!(link.payment_url.contains("orderCode="));

    let stored = Payment::find_by_id(link.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentState::Pending);
    assert_eq!(stored.subtotal, dec!(200));
    assert_eq!(stored.amount, dec!(1200));
    assert!(!stored.is_expired);

    let timeout = stored.payment_timeout.unwrap();
    let window = timeout - stored.created_at;
    assert_eq!(window.num_seconds(), 120);
}

#[tokio::test]
async fn create_payment_requires_order_ownership() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let intruder = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;
    let order_id = seed_online_order(&app, &customer, product.id, 1).await;

    let err = app
        .state
        .services
        .payments
        .create_payment(&intruder, order_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn create_payment_rejects_cod_orders() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;

    let order = app
        .state
        .services
        .orders
        .create_order(
            &customer,
            CreateOrderInput {
                items: vec![CreateOrderItem {
                    product_id: product.id,
                    quantity: 1,
                }],
                recipient_name: "Linh Tran".to_string(),
                phone: "0901234567".to_string(),
                shipping_address: "12 Hang Bai, Hanoi".to_string(),
                payment_method: PaymentMethod::Cod,
                note: None,
            },
        )
        .await
        .unwrap();

    let err = app
        .state
        .services
        .payments
        .create_payment(&customer, order.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn young_pending_payment_is_reused() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;
    let order_id = seed_online_order(&app, &customer, product.id, 1).await;

    let first = app
        .state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();
    let second = app
        .state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();

    assert_eq!(first.payment_id, second.payment_id);
    assert_eq!(first.payment_url, second.payment_url);
}

#[tokio::test]
async fn stale_pending_payment_is_replaced() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;
    let order_id = seed_online_order(&app, &customer, product.id, 1).await;

    let first = app
        .state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();

    // Age the attempt past the reuse window.
    let stored = Payment::find_by_id(first.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut aged: payment::ActiveModel = stored.into();
    aged.created_at = Set(Utc::now() - Duration::minutes(45));
    aged.update(&*app.state.db).await.unwrap();

    let second = app
        .state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();
    assert_ne!(first.payment_id, second.payment_id);

    let old = Payment::find_by_id(first.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old.status, PaymentState::Failed);
    assert!(old.cancelled_at.is_some());
}

#[tokio::test]
async fn webhook_settles_the_order_exactly_once() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;
    let order_id = seed_online_order(&app, &customer, product.id, 2).await;

    // The customer refilled the cart while paying; settlement clears it.
    app.state
        .services
        .carts
        .add_item(customer.user_id, product.id, 1)
        .await
        .unwrap();

    let link = app
        .state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();
    let stored = Payment::find_by_id(link.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();

    let ack = app
        .state
        .services
        .payments
        .reconcile(success_payload(stored.provider_order_code))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Processed);

    let paid = Payment::find_by_id(link.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(paid.status, PaymentState::Completed);
    assert_eq!(paid.transaction_id.as_deref(), Some("FT9876"));
    assert!(paid.paid_at.is_some());

    let order = app
        .state
        .services
        .orders
        .get_order(&customer, order_id)
        .await
        .unwrap();
    assert_eq!(order.order.payment_status, PaymentStatus::Success);
    assert!(order.order.stock_deducted);

    let product_after = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product_after.stock_quantity, 8);

    let cart = app
        .state
        .services
        .carts
        .get_or_create(customer.user_id)
        .await
        .unwrap();
    assert!(cart.items.is_empty());

    // Replay: acknowledged, nothing re-deducted.
    let ack = app
        .state
        .services
        .payments
        .reconcile(success_payload(stored.provider_order_code))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::AlreadyProcessed);
    let product_after = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product_after.stock_quantity, 8);
}

#[tokio::test]
async fn webhook_with_unknown_order_code_changes_nothing() {
    let app = TestApp::new().await;

    let ack = app
        .state
        .services
        .payments
        .reconcile(success_payload(999_999_999))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::UnknownOrderCode);
}

#[tokio::test]
async fn empty_webhook_payload_is_a_probe() {
    let app = TestApp::new().await;
    let ack = app
        .state
        .services
        .payments
        .reconcile(WebhookPayload {
            code: None,
            desc: None,
            data: None,
            signature: None,
        })
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Ignored);
}

#[tokio::test]
async fn failure_webhook_marks_payment_and_order_failed() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;
    let order_id = seed_online_order(&app, &customer, product.id, 1).await;

    let link = app
        .state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();
    let stored = Payment::find_by_id(link.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();

    let ack = app
        .state
        .services
        .payments
        .reconcile(WebhookPayload {
            code: Some("07".to_string()),
            desc: Some("declined".to_string()),
            data: Some(WebhookData {
                order_code: stored.provider_order_code,
                transaction_date_time: None,
                reference: None,
            }),
            signature: None,
        })
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::MarkedFailed);

    let failed = Payment::find_by_id(link.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, PaymentState::Failed);

    let order = app
        .state
        .services
        .orders
        .get_order(&customer, order_id)
        .await
        .unwrap();
    assert_eq!(order.order.payment_status, PaymentStatus::Failed);
    // No stock was ever deducted on the failure path.
    assert!(!order.order.stock_deducted);
    let product_after = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product_after.stock_quantity, 10);
}

#[tokio::test]
async fn webhook_after_cancellation_is_a_no_op_for_the_order() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;
    let order_id = seed_online_order(&app, &customer, product.id, 1).await;

    let link = app
        .state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();
    let stored = Payment::find_by_id(link.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();

    // Cancel wins the race.
    app.state
        .services
        .orders
        .cancel_order(&customer, order_id, None)
        .await
        .unwrap();

    let ack = app
        .state
        .services
        .payments
        .reconcile(success_payload(stored.provider_order_code))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Ignored);

    let order = app
        .state
        .services
        .orders
        .get_order(&customer, order_id)
        .await
        .unwrap();
    assert_eq!(order.order.status, OrderStatus::Cancelled);
    assert_eq!(order.order.payment_status, PaymentStatus::Cancelled);
    let product_after = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product_after.stock_quantity, 10);

    // The untouched payment is left for the timeout sweep.
    let untouched = Payment::find_by_id(link.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, PaymentState::Pending);
}

#[tokio::test]
async fn reset_fails_all_pending_payments() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;
    let order_id = seed_online_order(&app, &customer, product.id, 1).await;

    app.state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();

    let count = app
        .state
        .services
        .payments
        .reset(&customer, order_id)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let remaining = Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .filter(payment::Column::Status.eq(PaymentState::Pending))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn timeout_sweep_expires_overdue_payments_idempotently() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;
    let order_id = seed_online_order(&app, &customer, product.id, 1).await;

    let link = app
        .state
        .services
        .payments
        .create_payment(&customer, order_id)
        .await
        .unwrap();

    // Age past the 120-second link window.
    let stored = Payment::find_by_id(link.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut aged: payment::ActiveModel = stored.into();
    aged.payment_timeout = Set(Some(Utc::now() - Duration::seconds(30)));
    aged.update(&*app.state.db).await.unwrap();

    let expired = app.state.services.payments.expire_stale().await.unwrap();
    assert_eq!(expired, 1);

    let swept = Payment::find_by_id(link.payment_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(swept.status, PaymentState::Failed);
    assert!(swept.is_expired);

    // Second pass finds nothing.
    let expired = app.state.services.payments.expire_stale().await.unwrap();
    assert_eq!(expired, 0);
}
