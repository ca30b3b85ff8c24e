use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::catalog::{CreateProductInput, ProductView, UpdateProductInput},
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SalePriceRequest {
    pub sale_price: Decimal,
}

/// List catalog products; the auto-sale policy is applied at read time.
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
    ),
    responses((status = 200, description = "Products listed")),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<ProductView>>>, ServiceError> {
    let (items, total) = state
        .services
        .catalog
        .list_products(query.page, query.limit, query.category)
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
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductView>>, ServiceError> {
    let view = state.services.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    responses(
        (status = 201, description = "Product created"),
        (status = 403, description = "Staff privileges required", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductView>>), ServiceError> {
    auth.require_staff()?;
    let view = state
        .services
        .catalog
        .create_product(auth.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(view))))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product updated"),
        (status = 403, description = "Not the product owner", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(input): Json<UpdateProductInput>,
) -> Result<Json<ApiResponse<ProductView>>, ServiceError> {
    auth.require_staff()?;
    let view = state
        .services
        .catalog
        .update_product(auth.user_id, auth.is_admin(), id, input)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Manual markdown; only valid inside the 30-day expiry window.
#[utoipa::path(
    patch,
    path = "/api/v1/products/{id}/sale-price",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Markdown applied"),
        (status = 400, description = "Markdown rejected", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn set_sale_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(request): Json<SalePriceRequest>,
) -> Result<Json<ApiResponse<ProductView>>, ServiceError> {
    auth.require_staff()?;
    let view = state
        .services
        .catalog
        .set_sale_price(auth.user_id, auth.is_admin(), id, request.sale_price)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/products/low-stock",
    params(("threshold" = Option<i32>, Query, description = "Override threshold")),
    responses((status = 200, description = "Low-stock products")),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<ProductView>>>, ServiceError> {
    auth.require_staff()?;
    let threshold = query.threshold.unwrap_or(state.config.low_stock_threshold);
    let items = state.services.catalog.low_stock(threshold).await?;
    Ok(Json(ApiResponse::success(items)))
}
