use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use super::error_handling::AppError;
use crate::AppState;

/// Gate for the scheduler endpoint. With no `CRON_SECRET` configured the
/// route is open.
pub async fn cron_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(secret) = state.cron_secret.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer);

    match token {
        Some(token) if token.as_bytes().ct_eq(secret.as_bytes()).into() => Ok(next.run(request).await),
        _ => {
            tracing::warn!("Rejected sync trigger without a valid cron token");
            Err(AppError::Unauthorized)
        }
    }
}

pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ").map(str::trim)
}
