use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::payments::{PaymentLinkResponse, WebhookAck, WebhookPayload},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
}

/// Create (or reuse) a hosted-checkout session for an order.
#[utoipa::path(
    post,
    path = "/api/v1/payments/create",
    responses(
        (status = 200, description = "Payment link ready"),
        (status = 403, description = "Not the order owner", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<ApiResponse<PaymentLinkResponse>>, ServiceError> {
    auth.require_customer()?;
    let link = state
        .services
        .payments
        .create_payment(&auth, request.order_id)
        .await?;
    Ok(Json(ApiResponse::success(link)))
}

/// Provider webhook. Always answers 200 for tolerated conditions (probes,
/// unknown order codes, replays) so the provider stops retrying.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses((status = 200, description = "Webhook acknowledged")),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ServiceError> {
    // Empty or non-JSON bodies are provider probes.
    let Some(Json(raw)) = body else {
        return Ok(Json(json!({ "success": true, "ack": "ignored" })));
    };
    let payload: WebhookPayload = match serde_json::from_value(raw) {
        Ok(payload) => payload,
        Err(_) => {
            return Ok(Json(json!({ "success": true, "ack": "ignored" })));
        }
    };

    let ack = state.services.payments.reconcile(payload).await?;
    let message = match ack {
        WebhookAck::Processed => "payment recorded",
        WebhookAck::MarkedFailed => "payment marked failed",
        WebhookAck::AlreadyProcessed => "payment already processed",
        WebhookAck::UnknownOrderCode => "order code not recognised",
        WebhookAck::Ignored => "nothing to process",
    };
    Ok(Json(json!({ "success": true, "ack": ack, "message": message })))
}

/// Mark every pending payment for the order failed.
#[utoipa::path(
    post,
    path = "/api/v1/payments/reset/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Pending payments reset"),
        (status = 403, description = "Not the order owner", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Payments"
)]
pub async fn reset(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    auth.require_customer()?;
    let count = state.services.payments.reset(&auth, order_id).await?;
    Ok(Json(ApiResponse::success(json!({ "reset": count }))))
}
