mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use glowcart_api::{entities::user::UserRole, errors::ServiceError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn add_creates_cart_and_computes_totals() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(100), 10, None).await;

    let cart = app
        .state
        .services
        .carts
        .add_item(customer.user_id, product.id, 2)
        .await
        .unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(cart.items[0].unit_price, dec!(100));
    assert_eq!(cart.items[0].subtotal, dec!(200));
    assert_eq!(cart.cart.total_amount, dec!(200));
}

#[tokio::test]
async fn adding_same_product_merges_quantities() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(50), 10, None).await;

    app.state
        .services
        .carts
        .add_item(customer.user_id, product.id, 2)
        .await
        .unwrap();
    let cart = app
        .state
        .services
        .carts
        .add_item(customer.user_id, product.id, 3)
        .await
        .unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.cart.total_amount, dec!(250));
}

#[tokio::test]
async fn near_expiry_product_lands_in_cart_at_sale_price() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let expiry = Some(Utc::now() + Duration::days(20));
    let product = app.seed_product(staff.user_id, dec!(200), 10, expiry).await;

    let cart = app
        .state
        .services
        .carts
        .add_item(customer.user_id, product.id, 1)
        .await
        .unwrap();

    assert_eq!(cart.items[0].unit_price, dec!(180));
}

#[tokio::test]
async fn add_rejects_insufficient_stock() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(10), 3, None).await;

    let err = app
        .state
        .services
        .carts
        .add_item(customer.user_id, product.id, 4)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Exactly the visible stock is allowed.
    let cart = app
        .state
        .services
        .carts
        .add_item(customer.user_id, product.id, 3)
        .await
        .unwrap();
    assert_eq!(cart.items[0].quantity, 3);
}

#[tokio::test]
async fn zero_quantity_is_rejected() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(10), 3, None).await;

    let err = app
        .state
        .services
        .carts
        .add_item(customer.user_id, product.id, 0)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn add_then_remove_restores_the_total() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(75), 10, None).await;

    let cart = app
        .state
        .services
        .carts
        .add_item(customer.user_id, product.id, 2)
        .await
        .unwrap();
    let item_id = cart.items[0].id;

    let cart = app
        .state
        .services
        .carts
        .remove_item(customer.user_id, item_id)
        .await
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.cart.total_amount, Decimal::ZERO);
}

#[tokio::test]
async fn update_recomputes_totals_and_checks_stock() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let customer = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(40), 5, None).await;

    let cart = app
        .state
        .services
        .carts
        .add_item(customer.user_id, product.id, 1)
        .await
        .unwrap();
    let item_id = cart.items[0].id;

    let cart = app
        .state
        .services
        .carts
        .update_item(customer.user_id, item_id, 4)
        .await
        .unwrap();
    assert_eq!(cart.cart.total_amount, dec!(160));

    let err = app
        .state
        .services
        .carts
        .update_item(customer.user_id, item_id, 9)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn foreign_cart_items_are_forbidden() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let owner = app.seed_user(UserRole::Customer).await;
    let intruder = app.seed_user(UserRole::Customer).await;
    let product = app.seed_product(staff.user_id, dec!(10), 10, None).await;

    let cart = app
        .state
        .services
        .carts
        .add_item(owner.user_id, product.id, 1)
        .await
        .unwrap();
    let item_id = cart.items[0].id;

    let err = app
        .state
        .services
        .carts
        .update_item(intruder.user_id, item_id, 2)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let err = app
        .state
        .services
        .carts
        .remove_item(intruder.user_id, item_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn get_or_create_returns_a_stable_cart() {
    let app = TestApp::new().await;
    let customer = app.seed_user(UserRole::Customer).await;

    let first = app
        .state
        .services
        .carts
        .get_or_create(customer.user_id)
        .await
        .unwrap();
    let second = app
        .state
        .services
        .carts
        .get_or_create(customer.user_id)
        .await
        .unwrap();

    assert_eq!(first.cart.id, second.cart.id);
    assert_eq!(second.cart.total_amount, Decimal::ZERO);
}
