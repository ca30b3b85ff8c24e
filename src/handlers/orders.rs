use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order::{self, OrderStatus, PaymentStatus},
    errors::ServiceError,
    services::orders::{
        CreateOrderInput, OrderStats, OrderWithDetails, UpdateOrderStatusInput,
    },
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManageQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// Place an order from an explicit item list; clears the caller's cart.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    responses(
        (status = 201, description = "Order created"),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateOrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<OrderWithDetails>>), ServiceError> {
    auth.require_customer()?;
    let order = state.services.orders.create_order(&auth, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Orders visible to the caller (own orders, or orders containing the
/// staff member's products).
#[utoipa::path(
    get,
    path = "/api/v1/orders/my-orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
    ),
    responses((status = 200, description = "Orders listed")),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderWithDetails>>>, ServiceError> {
    let (items, total) = state
        .services
        .orders
        .my_orders(&auth, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/stats",
    responses((status = 200, description = "Order statistics")),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<OrderStats>>, ServiceError> {
    auth.require_staff()?;
    let stats = state.services.orders.stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/manage",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("payment_status" = Option<String>, Query, description = "Filter by payment status"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
    ),
    responses((status = 200, description = "Orders listed")),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn manage(
    State(state): State<AppState>,
    Query(query): Query<ManageQuery>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<PaginatedResponse<order::Model>>>, ServiceError> {
    auth.require_staff()?;
    let (items, total) = state
        .services
        .orders
        .manage(query.status, query.payment_status, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved"),
        (status = 403, description = "Not the order owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<OrderWithDetails>>, ServiceError> {
    let order = state.services.orders.get_order(&auth, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Customer cancel, allowed only while the order is pending.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled"),
        (status = 400, description = "Order is past pending", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<ApiResponse<OrderWithDetails>>, ServiceError> {
    auth.require_customer()?;
    let order = state
        .services
        .orders
        .cancel_order(&auth, id, request.reason)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Per-product staff transition: stock moves only for the caller's
/// products.
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_status_scoped(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(input): Json<UpdateOrderStatusInput>,
) -> Result<Json<ApiResponse<OrderWithDetails>>, ServiceError> {
    auth.require_staff()?;
    let order = state
        .services
        .orders
        .update_status_scoped(&auth, id, input)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Full staff/admin transition: the authoritative state-machine path.
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/update-status",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(input): Json<UpdateOrderStatusInput>,
) -> Result<Json<ApiResponse<OrderWithDetails>>, ServiceError> {
    auth.require_staff()?;
    let order = state.services.orders.update_status(&auth, id, input).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Manual payment-status override for non-online orders.
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/payment-status",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Payment status updated"),
        (status = 400, description = "Online orders settle via webhook", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(request): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<ApiResponse<OrderWithDetails>>, ServiceError> {
    auth.require_staff()?;
    let order = state
        .services
        .orders
        .update_payment_status(id, request.payment_status, request.note)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
