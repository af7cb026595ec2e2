//! HTTP surface: evaluation, administration and embeddable middleware.

mod client_ip;
pub mod middleware;
mod server;
mod service;

pub use client_ip::{extract_client_ip, UNKNOWN_IP};
pub use middleware::enforce_rate_limit;
pub use server::HttpServer;
pub use service::{admin_router, public_router};
