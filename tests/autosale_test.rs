mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use glowcart_api::{
    entities::{product, user::UserRole, Product},
    errors::ServiceError,
    services::catalog::UpdateProductInput,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

#[tokio::test]
async fn product_inside_the_window_is_served_discounted() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let expiry = Some(Utc::now() + Duration::days(20));
    let product = app.seed_product(staff.user_id, dec!(200), 10, expiry).await;

    let view = app.state.services.catalog.get_product(product.id).await.unwrap();
    assert!(view.is_on_sale);
    assert_eq!(view.sale_price, Some(dec!(180)));

    // The discount is never written back to the row.
    let stored = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.sale_price.is_none());
    assert!(!stored.is_on_sale);
}

#[tokio::test]
async fn moving_the_expiry_out_clears_the_automatic_discount() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let expiry = Some(Utc::now() + Duration::days(20));
    let product = app.seed_product(staff.user_id, dec!(200), 10, expiry).await;

    // Simulate an admin having stored the automatic price.
    let stored = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: product::ActiveModel = stored.into();
    active.sale_price = Set(Some(dec!(180)));
    active.is_on_sale = Set(true);
    active.update(&*app.state.db).await.unwrap();

    app.state
        .services
        .catalog
        .update_product(
            staff.user_id,
            false,
            product.id,
            UpdateProductInput {
                name: None,
                description: None,
                brand: None,
                category: None,
                image_url: None,
                price: None,
                expiry_date: Some(Utc::now() + Duration::days(60)),
            },
        )
        .await
        .unwrap();

    let view = app.state.services.catalog.get_product(product.id).await.unwrap();
    assert!(!view.is_on_sale);
    assert_eq!(view.sale_price, None);
}

#[tokio::test]
async fn boundary_of_thirty_days_still_discounts() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let expiry = Some(Utc::now() + Duration::days(30));
    let product = app.seed_product(staff.user_id, dec!(200), 10, expiry).await;

    let view = app.state.services.catalog.get_product(product.id).await.unwrap();
    assert!(view.is_on_sale);
    assert_eq!(view.sale_price, Some(dec!(180)));
}

#[tokio::test]
async fn lower_manual_markdown_survives_the_automatic_one() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let expiry = Some(Utc::now() + Duration::days(20));
    let product = app.seed_product(staff.user_id, dec!(200), 10, expiry).await;

    app.state
        .services
        .catalog
        .set_sale_price(staff.user_id, false, product.id, dec!(150))
        .await
        .unwrap();

    let view = app.state.services.catalog.get_product(product.id).await.unwrap();
    assert!(view.is_on_sale);
    assert_eq!(view.sale_price, Some(dec!(150)));
}

#[tokio::test]
async fn manual_markdown_is_rejected_outside_the_window() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let expiry = Some(Utc::now() + Duration::days(60));
    let product = app.seed_product(staff.user_id, dec!(200), 10, expiry).await;

    let err = app
        .state
        .services
        .catalog
        .set_sale_price(staff.user_id, false, product.id, dec!(150))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn manual_markdown_must_undercut_the_list_price() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    let expiry = Some(Utc::now() + Duration::days(10));
    let product = app.seed_product(staff.user_id, dec!(200), 10, expiry).await;

    let err = app
        .state
        .services
        .catalog
        .set_sale_price(staff.user_id, false, product.id, dec!(200))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn markdowns_are_limited_to_the_products_creator() {
    let app = TestApp::new().await;
    let owner = app.seed_user(UserRole::Staff).await;
    let other = app.seed_user(UserRole::Staff).await;
    let admin = app.seed_user(UserRole::Admin).await;
    let expiry = Some(Utc::now() + Duration::days(10));
    let product = app.seed_product(owner.user_id, dec!(200), 10, expiry).await;

    let err = app
        .state
        .services
        .catalog
        .set_sale_price(other.user_id, false, product.id, dec!(150))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    // Admins bypass the ownership predicate.
    assert!(app
        .state
        .services
        .catalog
        .set_sale_price(admin.user_id, true, product.id, dec!(150))
        .await
        .is_ok());
}

#[tokio::test]
async fn low_stock_report_uses_the_threshold() {
    let app = TestApp::new().await;
    let staff = app.seed_user(UserRole::Staff).await;
    app.seed_product(staff.user_id, dec!(10), 3, None).await;
    app.seed_product(staff.user_id, dec!(10), 50, None).await;

    let low = app.state.services.catalog.low_stock(10).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].stock_quantity, 3);
}
