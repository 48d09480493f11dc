//! HTTP metrics middleware.
//!
//! Applied as the outermost layer so that every response is counted,
//! including authentication rejections and framework-level errors such as
//! 404 and 405 that never reach a handler.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Record method, normalized path, status code and duration of a request.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn handler_200() -> &'static str {
        "OK"
    }

    async fn handler_401() -> (StatusCode, &'static str) {
        (StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    fn test_app() -> Router {
        Router::new()
            .route("/health", get(handler_200))
            .route("/api/v1/me", get(handler_401))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn status_for(uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request builder should succeed");

        test_app()
            .oneshot(request)
            .await
            .expect("request should succeed")
            .status()
    }

    #[tokio::test]
    async fn test_middleware_passes_response_through() {
        assert_eq!(status_for("/health").await, StatusCode::OK);
        assert_eq!(status_for("/api/v1/me").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_middleware_sees_not_found() {
        assert_eq!(status_for("/nonexistent").await, StatusCode::NOT_FOUND);
    }
}
