// ============================================================================
// Request ID Middleware
// ============================================================================
//
// Request: `X-Request-ID: <uuid>` (optional, client can provide)
// Response: `X-Request-ID: <uuid>` (always returned)
//
// A missing or malformed client value is replaced by a fresh UUID v4.
//
// ============================================================================

use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::utils::log_sanitizer::sanitize_for_log;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(request_id);

    tracing::info!(
        request_id = %request_id,
        method = %request.method(),
        uri = %sanitize_for_log(&request.uri().to_string()),
        "→ Incoming request"
    );

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    tracing::info!(
        request_id = %request_id,
        status = %response.status(),
        "← Outgoing response"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::Request,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let request_id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_request_id_preserved() {
        let client_request_id = Uuid::new_v4();

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, client_request_id.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let echoed = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert_eq!(echoed.to_str().unwrap(), client_request_id.to_string());
    }

    #[tokio::test]
    async fn test_invalid_request_id_replaced() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "invalid-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let request_id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
    }
}
