//! Rate limiting middleware for embedding in other axum applications.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/contact", post(submit))
//!     .layer(axum::middleware::from_fn_with_state(
//!         limiter.clone(),
//!         enforce_rate_limit::<RateLimiter>,
//!     ));
//! ```

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::debug;

use super::client_ip::extract_client_ip;
use super::service::too_many_requests;
use crate::ratelimit::{RateLimitRequest, RateLimiterBackend};

/// Evaluate every request against the IP tiers before it reaches the inner service.
///
/// The client IP comes from the proxy headers and the request path scopes
/// the counter, so each route is limited independently. Denied requests
/// get a 429 with `Retry-After`.
pub async fn enforce_rate_limit<R: RateLimiterBackend + 'static>(
    State(limiter): State<Arc<R>>,
    request: Request,
    next: Next,
) -> Response {
    let rate_limit_request = RateLimitRequest {
        identifier: Some(extract_client_ip(request.headers())),
        form_type: Some(request.uri().path().to_string()),
        ..Default::default()
    };

    let verdict = limiter.evaluate(&rate_limit_request).await;
    if verdict.allowed {
        return next.run(request).await;
    }

    debug!(
        identifier = ?rate_limit_request.identifier,
        path = %request.uri().path(),
        limit_type = ?verdict.limit_type,
        "Request rejected by rate limit middleware"
    );
    too_many_requests(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitingConfig;
    use crate::ratelimit::{ManualClock, RateLimiter};
    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn app(limiter: Arc<RateLimiter>) -> Router {
        Router::new()
            .route("/contact", post(|| async { "sent" }))
            .route("/signup", post(|| async { "welcome" }))
            .layer(axum::middleware::from_fn_with_state(
                limiter,
                enforce_rate_limit::<RateLimiter>,
            ))
    }

    fn submit(path: &str, ip: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("cf-connecting-ip", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_middleware_rejects_after_limit() {
        let limiter = Arc::new(
            RateLimiter::with_clock(&RateLimitingConfig::default(), Arc::new(ManualClock::new(0)))
                .unwrap(),
        );
        let app = app(limiter);

        for _ in 0..5 {
            let response = app.clone().oneshot(submit("/contact", "192.0.2.10")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(submit("/contact", "192.0.2.10")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");

        // Other routes and other clients keep their own counters.
        let response = app.clone().oneshot(submit("/signup", "192.0.2.10")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.oneshot(submit("/contact", "192.0.2.11")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
