//! Glowcart API Library
//!
//! Backend for a cosmetics/pharmacy storefront: catalog, carts, the
//! order/stock state machine, hosted-checkout payments and batch-level
//! inventory control.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tasks;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: auth::AuthService,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Common query parameters for list endpoints.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
    pub category: Option<String>,
}

pub(crate) fn default_page() -> u64 {
    1
}
pub(crate) fn default_limit() -> u64 {
    20
}

/// Standard success envelope.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        Self {
            items,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        }
    }
}

/// Standard API result type for JSON responses.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// The full v1 API surface.
pub fn api_v1_routes() -> Router<AppState> {
    let products = Router::new()
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route("/products/low-stock", get(handlers::products::low_stock))
        .route(
            "/products/:id",
            get(handlers::products::get_product).put(handlers::products::update_product),
        )
        .route(
            "/products/:id/sale-price",
            axum::routing::patch(handlers::products::set_sale_price),
        );

    let cart = Router::new()
        .route("/cart", get(handlers::carts::get_cart))
        .route("/cart/items", axum::routing::post(handlers::carts::add_item))
        .route(
            "/cart/items/:id",
            axum::routing::put(handlers::carts::update_item)
                .delete(handlers::carts::remove_item),
        );

    let orders = Router::new()
        .route(
            "/orders",
            axum::routing::post(handlers::orders::create_order),
        )
        .route("/orders/my-orders", get(handlers::orders::my_orders))
        .route("/orders/stats", get(handlers::orders::stats))
        .route("/orders/manage", get(handlers::orders::manage))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/cancel",
            axum::routing::post(handlers::orders::cancel_order),
        )
        .route(
            "/orders/:id/status",
            axum::routing::patch(handlers::orders::update_status_scoped),
        )
        .route(
            "/orders/:id/update-status",
            axum::routing::patch(handlers::orders::update_status),
        )
        .route(
            "/orders/:id/payment-status",
            axum::routing::patch(handlers::orders::update_payment_status),
        );

    let payments = Router::new()
        .route(
            "/payments/create",
            axum::routing::post(handlers::payments::create_payment),
        )
        .route(
            "/payments/webhook",
            axum::routing::post(handlers::payments::webhook),
        )
        .route(
            "/payments/reset/:order_id",
            axum::routing::post(handlers::payments::reset),
        );

    let inventory = Router::new()
        .route(
            "/batches",
            get(handlers::inventory::list_batches).post(handlers::inventory::create_batch),
        )
        .route(
            "/batches/expiring-soon",
            get(handlers::inventory::expiring_soon),
        )
        .route("/batches/expired", get(handlers::inventory::expired))
        .route("/batches/:id", get(handlers::inventory::get_batch))
        .route(
            "/batches/:id/approve",
            axum::routing::post(handlers::inventory::approve_batch),
        )
        .route(
            "/batches/:id/dispose",
            axum::routing::post(handlers::inventory::dispose_batch),
        )
        .route(
            "/stock-movements",
            get(handlers::inventory::list_movements),
        );

    let suppliers = Router::new()
        .route(
            "/suppliers",
            get(handlers::suppliers::list_suppliers).post(handlers::suppliers::create_supplier),
        )
        .route("/suppliers/:id", get(handlers::suppliers::get_supplier));

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(products)
        .merge(cart)
        .merge(orders)
        .merge(payments)
        .merge(inventory)
        .merge(suppliers)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "service": "glowcart-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": { "database": db_status },
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_envelope_carries_data() {
        let response = ApiResponse::success(42);
        assert!(response.success);
        assert_eq!(response.data, Some(42));
        assert!(response.message.is_none());
    }

    #[test]
    fn error_envelope_carries_message() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("oops"));
    }

    #[test]
    fn pagination_rounds_total_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        let exact = PaginatedResponse::new(vec![1], 40, 1, 20);
        assert_eq!(exact.total_pages, 2);
        let empty = PaginatedResponse::<i32>::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn list_query_defaults() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 20);
    }
}
