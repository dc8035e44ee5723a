// ============================================================================
// Error Handling - JSON error responses
// ============================================================================
//
// Every failure is logged server-side with full detail and answered with
// `{"success": false, "error": "<generic message>"}`. Raw Odoo or database
// messages never reach the storefront.
//
// ============================================================================

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::repositories::StoreError;
use crate::services::{OrderError, SyncError};

const SERVICE_UNAVAILABLE: &str = "The service is temporarily unavailable. Please try again in a moment.";
const ORDER_FAILED: &str = "We could not process your order. Please contact our support team.";
const ORDER_REFERENCE_IN_USE: &str = "This order reference is already in use.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] JsonRejection),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Order failed: {0}")]
    OrderFailed(OrderError),

    #[error("Sync failed: {0}")]
    SyncFailed(#[from] SyncError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(errors) => AppError::Validation(errors),
            OrderError::Storage(err) => AppError::Storage(err),
            conflict @ OrderError::KeyConflict { .. } => AppError::Conflict(conflict.to_string()),
            other => AppError::OrderFailed(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Storage(err) => {
                tracing::error!("Storage error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, SERVICE_UNAVAILABLE.to_string())
            }
            AppError::Validation(errors) => {
                tracing::debug!("Validation failed: {}", errors);
                (StatusCode::BAD_REQUEST, "Validation failed".to_string())
            }
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "Invalid JSON".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Conflict(detail) => {
                tracing::warn!("Conflict: {}", detail);
                (StatusCode::CONFLICT, ORDER_REFERENCE_IN_USE.to_string())
            }
            AppError::OrderFailed(err) => {
                tracing::error!("Order submission failed: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, ORDER_FAILED.to_string())
            }
            AppError::SyncFailed(err) => {
                // only reachable by the scheduler, which reads the message
                tracing::error!("Sync failed: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
