mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use glowcart_api::{
    entities::{
        batch::{self, BatchStatus},
        order::{OrderStatus, PaymentMethod},
        stock_movement::{self, MovementType, ReferenceKind},
        user::UserRole,
        Batch, Product, StockMovement, Supplier,
    },
    errors::ServiceError,
    services::{
        inventory::{CreateBatchInput, DisposeBatchInput},
        orders::{CreateOrderInput, CreateOrderItem, UpdateOrderStatusInput},
    },
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

fn batch_input(product_id: Uuid, supplier_id: Uuid, quantity: i32) -> CreateBatchInput {
    CreateBatchInput {
        product_id,
        supplier_id,
        quantity,
        unit_cost: dec!(20),
        manufacturing_date: Utc::now() - Duration::days(10),
        expiry_date: Utc::now() + Duration::days(180),
        location: Some("shelf A3".to_string()),
        notes: None,
        quality_passed: true,
    }
}

async fn stock_of(app: &TestApp, product_id: Uuid) -> i32 {
    Product::find_by_id(product_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

#[tokio::test]
async fn create_batch_starts_pending_and_bumps_supplier_counters() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let product = app.seed_product(staff.user_id, dec!(100), 0, None).await;
    let supplier = app.seed_supplier().await;

    let created = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, batch_input(product.id, supplier.id, 40))
        .await
        .unwrap();

    assert_eq!(created.status, BatchStatus::Pending);
    assert_eq!(created.remaining_quantity, 40);
    assert!(created.batch_code.starts_with("LOT-"));

    let supplier = Supplier::find_by_id(supplier.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(supplier.total_orders, 1);
    assert_eq!(supplier.total_value, dec!(800));

    // Product stock untouched until approval.
    assert_eq!(stock_of(&app, product.id).await, 0);
}

#[tokio::test]
async fn batch_date_validation() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let product = app.seed_product(staff.user_id, dec!(100), 0, None).await;
    let supplier = app.seed_supplier().await;

    // Future manufacturing date.
    let mut input = batch_input(product.id, supplier.id, 10);
    input.manufacturing_date = Utc::now() + Duration::days(2);
    let err = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, input)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Expiry before manufacturing.
    let mut input = batch_input(product.id, supplier.id, 10);
    input.expiry_date = input.manufacturing_date - Duration::days(1);
    let err = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, input)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Expiry today is rejected; manufacturing today is allowed.
    let mut input = batch_input(product.id, supplier.id, 10);
    input.manufacturing_date = Utc::now();
    input.expiry_date = Utc::now();
    let err = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, input)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let mut input = batch_input(product.id, supplier.id, 10);
    input.manufacturing_date = Utc::now();
    assert!(app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, input)
        .await
        .is_ok());
}

#[tokio::test]
async fn approval_requires_quality_and_books_the_purchase() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let product = app.seed_product(staff.user_id, dec!(100), 0, None).await;
    let supplier = app.seed_supplier().await;

    let mut unchecked = batch_input(product.id, supplier.id, 25);
    unchecked.quality_passed = false;
    let created = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, unchecked)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .inventory
        .approve_batch(staff.user_id, created.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let checked = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, batch_input(product.id, supplier.id, 25))
        .await
        .unwrap();
    let approved = app
        .state
        .services
        .inventory
        .approve_batch(staff.user_id, checked.id)
        .await
        .unwrap();

    assert_eq!(approved.status, BatchStatus::Active);
    assert_eq!(approved.approved_by, Some(staff.user_id));
    assert_eq!(stock_of(&app, product.id).await, 25);

    let movements = StockMovement::find()
        .filter(stock_movement::Column::BatchId.eq(checked.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, MovementType::In);
    assert_eq!(movements[0].quantity, 25);
    assert_eq!(movements[0].reason, "purchase");
    assert_eq!(movements[0].total_value, dec!(500));

    // Approving twice is rejected.
    let err = app
        .state
        .services
        .inventory
        .approve_batch(staff.user_id, checked.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn disposal_decrements_and_finally_marks_disposed() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let product = app.seed_product(staff.user_id, dec!(100), 0, None).await;
    let supplier = app.seed_supplier().await;

    let created = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, batch_input(product.id, supplier.id, 10))
        .await
        .unwrap();
    app.state
        .services
        .inventory
        .approve_batch(staff.user_id, created.id)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .inventory
        .dispose_batch(
            staff.user_id,
            created.id,
            DisposeBatchInput {
                quantity: 11,
                reason: "water damage".to_string(),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let partial = app
        .state
        .services
        .inventory
        .dispose_batch(
            staff.user_id,
            created.id,
            DisposeBatchInput {
                quantity: 4,
                reason: "water damage".to_string(),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(partial.remaining_quantity, 6);
    assert_eq!(partial.status, BatchStatus::Active);
    assert_eq!(stock_of(&app, product.id).await, 6);

    let rest = app
        .state
        .services
        .inventory
        .dispose_batch(
            staff.user_id,
            created.id,
            DisposeBatchInput {
                quantity: 6,
                reason: "expired".to_string(),
                notes: Some("cleared during audit".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(rest.remaining_quantity, 0);
    assert_eq!(rest.status, BatchStatus::Disposed);
    assert_eq!(stock_of(&app, product.id).await, 0);

    let disposals = StockMovement::find()
        .filter(stock_movement::Column::BatchId.eq(created.id))
        .filter(stock_movement::Column::MovementType.eq(MovementType::Disposal))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(disposals.len(), 2);
    assert!(disposals.iter().all(|m| m.quantity < 0));
}

#[tokio::test]
async fn order_consumption_follows_fifo_by_expiry() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 0, None).await;
    let supplier = app.seed_supplier().await;

    // B1 expires sooner and must drain first.
    let mut b1_input = batch_input(product.id, supplier.id, 3);
    b1_input.expiry_date = Utc::now() + Duration::days(40);
    let b1 = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, b1_input)
        .await
        .unwrap();
    let mut b2_input = batch_input(product.id, supplier.id, 5);
    b2_input.expiry_date = Utc::now() + Duration::days(90);
    let b2 = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, b2_input)
        .await
        .unwrap();
    app.state
        .services
        .inventory
        .approve_batch(staff.user_id, b1.id)
        .await
        .unwrap();
    app.state
        .services
        .inventory
        .approve_batch(staff.user_id, b2.id)
        .await
        .unwrap();
    assert_eq!(stock_of(&app, product.id).await, 8);

    let order = app
        .state
        .services
        .orders
        .create_order(
            &customer,
            CreateOrderInput {
                items: vec![CreateOrderItem {
                    product_id: product.id,
                    quantity: 4,
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

    app.state
        .services
        .orders
        .update_status(
            &staff,
            order.order.id,
            UpdateOrderStatusInput {
                status: OrderStatus::Processing,
                note: None,
                cancel_reason: None,
            },
        )
        .await
        .unwrap();

    let b1_after = Batch::find_by_id(b1.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let b2_after = Batch::find_by_id(b2.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b1_after.remaining_quantity, 0);
    assert_eq!(b2_after.remaining_quantity, 4);
    assert_eq!(stock_of(&app, product.id).await, 4);

    let sales = StockMovement::find()
        .filter(stock_movement::Column::ReferenceType.eq(ReferenceKind::Order))
        .filter(stock_movement::Column::ReferenceId.eq(order.order.id))
        .filter(stock_movement::Column::MovementType.eq(MovementType::Out))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(sales.len(), 2);
    assert!(sales.iter().all(|m| m.reason == "sale"));

    // Backward transition gives the stock back to the batches.
    app.state
        .services
        .orders
        .update_status(
            &staff,
            order.order.id,
            UpdateOrderStatusInput {
                status: OrderStatus::Pending,
                note: None,
                cancel_reason: None,
            },
        )
        .await
        .unwrap();

    let b1_restored = Batch::find_by_id(b1.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let b2_restored = Batch::find_by_id(b2.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b1_restored.remaining_quantity, 3);
    assert_eq!(b2_restored.remaining_quantity, 5);
    assert_eq!(stock_of(&app, product.id).await, 8);

    let returns = StockMovement::find()
        .filter(stock_movement::Column::ReferenceId.eq(order.order.id))
        .filter(stock_movement::Column::MovementType.eq(MovementType::Return))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert!(!returns.is_empty());
    assert!(returns.iter().all(|m| m.quantity > 0));
}

#[tokio::test]
async fn expired_batches_cannot_cover_an_order() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 0, None).await;
    let supplier = app.seed_supplier().await;

    let mut input = batch_input(product.id, supplier.id, 5);
    input.expiry_date = Utc::now() + Duration::days(2);
    let created = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, input)
        .await
        .unwrap();
    app.state
        .services
        .inventory
        .approve_batch(staff.user_id, created.id)
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .create_order(
            &customer,
            CreateOrderInput {
                items: vec![CreateOrderItem {
                    product_id: product.id,
                    quantity: 3,
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

    // The lot expires before fulfilment.
    use sea_orm::{ActiveModelTrait, Set};
    let stored = Batch::find_by_id(created.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut aged: batch::ActiveModel = stored.into();
    aged.expiry_date = Set(Utc::now() - Duration::days(1));
    aged.update(&*app.state.db).await.unwrap();

    let err = app
        .state
        .services
        .orders
        .update_status(
            &staff,
            order.order.id,
            UpdateOrderStatusInput {
                status: OrderStatus::Processing,
                note: None,
                cancel_reason: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // The aborted transition left no partial mutations behind.
    assert_eq!(stock_of(&app, product.id).await, 5);
    let refreshed = app
        .state
        .services
        .orders
        .get_order(&staff, order.order.id)
        .await
        .unwrap();
    assert_eq!(refreshed.order.status, OrderStatus::Pending);
    assert!(!refreshed.order.stock_deducted);
}

#[tokio::test]
async fn expiry_reports_split_soon_and_already_expired() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let product = app.seed_product(staff.user_id, dec!(100), 0, None).await;
    let supplier = app.seed_supplier().await;

    let mut soon = batch_input(product.id, supplier.id, 5);
    soon.expiry_date = Utc::now() + Duration::days(10);
    let soon = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, soon)
        .await
        .unwrap();
    let mut far = batch_input(product.id, supplier.id, 5);
    far.expiry_date = Utc::now() + Duration::days(200);
    let far = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, far)
        .await
        .unwrap();
    app.state
        .services
        .inventory
        .approve_batch(staff.user_id, soon.id)
        .await
        .unwrap();
    app.state
        .services
        .inventory
        .approve_batch(staff.user_id, far.id)
        .await
        .unwrap();

    let expiring = app.state.services.inventory.expiring_soon(30).await.unwrap();
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].id, soon.id);

    // Nothing has crossed its expiry date yet.
    assert!(app.state.services.inventory.expired().await.unwrap().is_empty());

    use sea_orm::{ActiveModelTrait, Set};
    let stored = Batch::find_by_id(soon.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut aged: batch::ActiveModel = stored.into();
    aged.expiry_date = Set(Utc::now() - Duration::days(1));
    aged.update(&*app.state.db).await.unwrap();

    let expired = app.state.services.inventory.expired().await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, soon.id);
}

#[tokio::test]
async fn movement_ledger_lists_newest_first() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let product = app.seed_product(staff.user_id, dec!(100), 0, None).await;
    let supplier = app.seed_supplier().await;

    let created = app
        .state
        .services
        .inventory
        .create_batch(staff.user_id, batch_input(product.id, supplier.id, 10))
        .await
        .unwrap();
    app.state
        .services
        .inventory
        .approve_batch(staff.user_id, created.id)
        .await
        .unwrap();

    let (movements, total) = app
        .state
        .services
        .inventory
        .list_movements(1, 10, Some(product.id))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(movements.len(), 1);
}
