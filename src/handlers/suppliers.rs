use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser, entities::supplier, errors::ServiceError,
    services::suppliers::CreateSupplierInput, ApiResponse, AppState, ListQuery, PaginatedResponse,
};

#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    responses(
        (status = 201, description = "Supplier created"),
        (status = 409, description = "Duplicate supplier code", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateSupplierInput>,
) -> Result<(StatusCode, Json<ApiResponse<supplier::Model>>), ServiceError> {
    auth.require_staff()?;
    let created = state.services.suppliers.create_supplier(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
    ),
    responses((status = 200, description = "Suppliers listed")),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<PaginatedResponse<supplier::Model>>>, ServiceError> {
    auth.require_staff()?;
    let (items, total) = state
        .services
        .suppliers
        .list_suppliers(query.page, query.limit)
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
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier retrieved"),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<supplier::Model>>, ServiceError> {
    auth.require_staff()?;
    let found = state.services.suppliers.get_supplier(id).await?;
    Ok(Json(ApiResponse::success(found)))
}
