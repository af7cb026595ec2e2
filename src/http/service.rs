//! HTTP routes for evaluation and administration.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, field, info, instrument, Span};

use super::client_ip::extract_client_ip;
use crate::ratelimit::{RateLimitRequest, RateLimiterBackend, Verdict};

/// Fallback body text when a denial carries no message.
const DEFAULT_DENY_MESSAGE: &str = "Too many requests";

/// Routes served on the public listener.
pub fn public_router<R: RateLimiterBackend + 'static>(limiter: Arc<R>) -> Router {
    Router::new()
        .route("/v1/evaluate", post(evaluate::<R>))
        .route("/healthz", get(healthz))
        .with_state(limiter)
}

/// Routes served on the admin listener.
pub fn admin_router<R: RateLimiterBackend + 'static>(limiter: Arc<R>) -> Router {
    Router::new()
        .route("/admin/stats/{identifier}", get(stats::<R>))
        .route("/admin/reset/{identifier}", post(reset::<R>))
        .route("/admin/clear", post(clear::<R>))
        .route("/admin/sweep", post(sweep::<R>))
        .route("/admin/sweeper/restart", post(restart_sweeper::<R>))
        .with_state(limiter)
}

#[derive(Serialize)]
struct DeniedBody {
    error: String,
    #[serde(flatten)]
    verdict: Verdict,
}

/// Map a deny verdict to `429 Too Many Requests` with `Retry-After`.
pub(crate) fn too_many_requests(verdict: Verdict) -> Response {
    let retry_after = verdict.retry_after_seconds.unwrap_or(1);
    let error = verdict
        .message
        .clone()
        .unwrap_or_else(|| DEFAULT_DENY_MESSAGE.to_string());

    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(DeniedBody { error, verdict }),
    )
        .into_response()
}

/// Evaluate a request. A missing identifier is taken from the client IP headers.
#[instrument(skip_all, fields(identifier = field::Empty, form_type = field::Empty))]
async fn evaluate<R: RateLimiterBackend>(
    State(limiter): State<Arc<R>>,
    headers: HeaderMap,
    Json(mut request): Json<RateLimitRequest>,
) -> Response {
    if request.identifier.is_none() {
        request.identifier = Some(extract_client_ip(&headers));
    }

    let span = Span::current();
    span.record("identifier", request.identifier.as_deref().unwrap_or_default());
    span.record("form_type", request.form_type.as_deref().unwrap_or_default());

    let verdict = limiter.evaluate(&request).await;

    debug!(allowed = verdict.allowed, limit_type = ?verdict.limit_type, "Rate limit decision made");

    if verdict.allowed {
        (StatusCode::OK, Json(verdict)).into_response()
    } else {
        too_many_requests(verdict)
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    #[serde(rename = "formType")]
    form_type: Option<String>,
}

async fn stats<R: RateLimiterBackend>(
    State(limiter): State<Arc<R>>,
    Path(identifier): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Response {
    Json(limiter.stats(&identifier, query.form_type.as_deref())).into_response()
}

async fn reset<R: RateLimiterBackend>(
    State(limiter): State<Arc<R>>,
    Path(identifier): Path<String>,
) -> StatusCode {
    limiter.reset(&identifier);
    StatusCode::NO_CONTENT
}

async fn clear<R: RateLimiterBackend>(State(limiter): State<Arc<R>>) -> StatusCode {
    limiter.clear_all();
    StatusCode::NO_CONTENT
}

async fn sweep<R: RateLimiterBackend>(State(limiter): State<Arc<R>>) -> Response {
    Json(limiter.sweep()).into_response()
}

async fn restart_sweeper<R: RateLimiterBackend + 'static>(
    State(limiter): State<Arc<R>>,
) -> StatusCode {
    info!("Sweep timer restart requested");
    limiter.restart_sweeper();
    StatusCode::NO_CONTENT
}
