//! Rate limiter trait for abstracting the engine behind the transport layer.

use async_trait::async_trait;
use std::sync::Arc;

use super::limiter::{RateLimitRequest, RateLimitStats};
use super::store::SweepReport;
use super::verdict::Verdict;

/// Trait for rate limiter implementations.
///
/// The HTTP layer is generic over this trait so the in-memory
/// [`RateLimiter`](super::RateLimiter) can be swapped for a shared-state
/// backend without touching the routes.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    /// Record the request and decide whether it is allowed.
    async fn evaluate(&self, request: &RateLimitRequest) -> Verdict;

    /// Occupancy for an identifier, without recording.
    fn stats(&self, identifier: &str, form_type: Option<&str>) -> RateLimitStats;

    /// Forget all counters for an identifier.
    fn reset(&self, identifier: &str);

    /// Forget all counters.
    fn clear_all(&self);

    /// Evict expired entries now.
    fn sweep(&self) -> SweepReport;

    /// Cancel and reschedule the periodic sweep.
    fn restart_sweeper(self: Arc<Self>);
}
