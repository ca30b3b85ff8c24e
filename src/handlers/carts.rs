use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser, errors::ServiceError, services::carts::CartWithItems, ApiResponse, AppState,
};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "The caller's cart")),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<CartWithItems>>, ServiceError> {
    auth.require_customer()?;
    let cart = state.services.carts.get_or_create(auth.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Add a product to the cart, merging with an existing line.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    responses(
        (status = 201, description = "Item added"),
        (status = 400, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CartWithItems>>), ServiceError> {
    auth.require_customer()?;
    let cart = state
        .services
        .carts
        .add_item(auth.user_id, request.product_id, request.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(cart))))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 200, description = "Item updated"),
        (status = 403, description = "Not the item owner", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(request): Json<UpdateCartItemRequest>,
) -> Result<Json<ApiResponse<CartWithItems>>, ServiceError> {
    auth.require_customer()?;
    let cart = state
        .services
        .carts
        .update_item(auth.user_id, id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 200, description = "Item removed"),
        (status = 403, description = "Not the item owner", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<CartWithItems>>, ServiceError> {
    auth.require_customer()?;
    let cart = state.services.carts.remove_item(auth.user_id, id).await?;
    Ok(Json(ApiResponse::success(cart)))
}
