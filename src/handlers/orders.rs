use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::error_handling::{AppError, Result};
use crate::models::order::{CreateOrderRequest, OrderSubmission, OrderWithLines};
use crate::utils::log_sanitizer::mask_email;
use crate::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Debug, Serialize)]
pub struct OrderCreatedResponse {
    pub success: bool,
    pub data: OrderSubmission,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub success: bool,
    pub data: Vec<OrderWithLines>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub email: Option<String>,
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<OrderCreatedResponse>> {
    let Json(mut request) = payload?;

    // the body field wins over the header
    if request.idempotency_key.is_none() {
        request.idempotency_key = headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
    }

    tracing::info!(
        "Order submission from {} with {} items",
        mask_email(&request.customer_email),
        request.items.len()
    );

    let submission = state.orders.submit(&request).await?;

    Ok(Json(OrderCreatedResponse {
        success: true,
        data: submission,
    }))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<OrderListParams>,
) -> Result<Json<OrderListResponse>> {
    let email = params
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("email is required".to_string()))?;

    let orders = state.orders.orders_by_email(&email).await?;

    Ok(Json(OrderListResponse {
        success: true,
        data: orders,
    }))
}
