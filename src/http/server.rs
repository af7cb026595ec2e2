//! HTTP server implementation.

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::service::{admin_router, public_router};
use crate::error::{FormgateError, Result};
use crate::ratelimit::RateLimiterBackend;

/// An HTTP listener serving either the public or the admin routes.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Routes to serve
    router: Router,
    /// Which surface this is, for logs
    kind: &'static str,
}

impl HttpServer {
    /// Create a server for the public evaluation routes.
    pub fn public<R: RateLimiterBackend + 'static>(addr: SocketAddr, rate_limiter: Arc<R>) -> Self {
        Self {
            addr,
            router: public_router(rate_limiter),
            kind: "public",
        }
    }

    /// Create a server for the admin routes.
    pub fn admin<R: RateLimiterBackend + 'static>(addr: SocketAddr, rate_limiter: Arc<R>) -> Self {
        Self {
            addr,
            router: admin_router(rate_limiter),
            kind: "admin",
        }
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;

        info!(
            addr = %listener.local_addr()?,
            kind = self.kind,
            "Starting HTTP server"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, kind = self.kind, "HTTP server failed");
                FormgateError::Server(e.to_string())
            })
    }
}
