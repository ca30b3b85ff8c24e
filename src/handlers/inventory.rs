use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{batch, stock_movement},
    errors::ServiceError,
    services::inventory::{CreateBatchInput, DisposeBatchInput},
    ApiResponse, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize)]
pub struct ExpiryQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchListQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    pub product_id: Option<Uuid>,
    pub status: Option<batch::BatchStatus>,
}

/// Register a received lot; it stays pending until approval.
#[utoipa::path(
    post,
    path = "/api/v1/batches",
    responses(
        (status = 201, description = "Batch created"),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Batches"
)]
pub async fn create_batch(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateBatchInput>,
) -> Result<(StatusCode, Json<ApiResponse<batch::Model>>), ServiceError> {
    auth.require_staff()?;
    let created = state
        .services
        .inventory
        .create_batch(auth.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/batches",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
        ("product_id" = Option<Uuid>, Query, description = "Filter by product"),
        ("status" = Option<String>, Query, description = "Filter by status"),
    ),
    responses((status = 200, description = "Batches listed")),
    security(("Bearer" = [])),
    tag = "Batches"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<BatchListQuery>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<PaginatedResponse<batch::Model>>>, ServiceError> {
    auth.require_staff()?;
    let (items, total) = state
        .services
        .inventory
        .list_batches(query.page, query.limit, query.product_id, query.status)
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
    path = "/api/v1/batches/{id}",
    params(("id" = Uuid, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch retrieved"),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Batches"
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<batch::Model>>, ServiceError> {
    auth.require_staff()?;
    let found = state.services.inventory.get_batch(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

/// Activate a batch after a passed quality check; books the purchase
/// into stock.
#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/approve",
    params(("id" = Uuid, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch activated"),
        (status = 400, description = "Quality check missing", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Batches"
)]
pub async fn approve_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<batch::Model>>, ServiceError> {
    auth.require_staff()?;
    let approved = state
        .services
        .inventory
        .approve_batch(auth.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(approved)))
}

#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/dispose",
    params(("id" = Uuid, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Stock disposed"),
        (status = 400, description = "Quantity exceeds remainder", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Batches"
)]
pub async fn dispose_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(input): Json<DisposeBatchInput>,
) -> Result<Json<ApiResponse<batch::Model>>, ServiceError> {
    auth.require_staff()?;
    let disposed = state
        .services
        .inventory
        .dispose_batch(auth.user_id, id, input)
        .await?;
    Ok(Json(ApiResponse::success(disposed)))
}

#[utoipa::path(
    get,
    path = "/api/v1/batches/expiring-soon",
    params(("days" = Option<i64>, Query, description = "Horizon in days")),
    responses((status = 200, description = "Batches expiring within the horizon")),
    security(("Bearer" = [])),
    tag = "Batches"
)]
pub async fn expiring_soon(
    State(state): State<AppState>,
    Query(query): Query<ExpiryQuery>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<batch::Model>>>, ServiceError> {
    auth.require_staff()?;
    let days = query.days.unwrap_or(state.config.expiring_soon_days);
    let items = state.services.inventory.expiring_soon(days).await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    get,
    path = "/api/v1/batches/expired",
    responses((status = 200, description = "Expired batches with stock on hand")),
    security(("Bearer" = [])),
    tag = "Batches"
)]
pub async fn expired(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<batch::Model>>>, ServiceError> {
    auth.require_staff()?;
    let items = state.services.inventory.expired().await?;
    Ok(Json(ApiResponse::success(items)))
}

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    pub product_id: Option<Uuid>,
}

/// Append-only ledger of stock deltas.
#[utoipa::path(
    get,
    path = "/api/v1/stock-movements",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
        ("product_id" = Option<Uuid>, Query, description = "Filter by product"),
    ),
    responses((status = 200, description = "Movements listed")),
    security(("Bearer" = [])),
    tag = "Batches"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<PaginatedResponse<stock_movement::Model>>>, ServiceError> {
    auth.require_staff()?;
    let (items, total) = state
        .services
        .inventory
        .list_movements(query.page, query.limit, query.product_id)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}
