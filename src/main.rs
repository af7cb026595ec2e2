use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use formgate::config::{FormgateConfig, LogFormat, LoggingConfig};
use formgate::http::HttpServer;
use formgate::ratelimit::RateLimiter;

/// Multi-tier sliding-window rate limiting service for form submissions.
#[derive(Debug, Parser)]
#[command(name = "formgate", version, about)]
struct Args {
    /// Path to a configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the public HTTP address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Override the admin HTTP address
    #[arg(long)]
    admin_addr: Option<SocketAddr>,

    /// Override the log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration; CLI flags take precedence
    let mut config = FormgateConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if let Some(addr) = args.admin_addr {
        config.server.admin_addr = addr;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }

    init_tracing(&config.logging);

    info!("Starting Formgate Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        file = args.config.as_deref().unwrap_or("<none>"),
        http_addr = %config.server.http_addr,
        admin_addr = %config.server.admin_addr,
        "Configuration loaded"
    );

    // Initialize the rate limiter and its expiry sweep
    let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limiting)?);
    RateLimiter::start_sweeper(&rate_limiter);
    info!("Rate limiter initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let public = HttpServer::public(config.server.http_addr, rate_limiter.clone())
        .serve_with_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin = HttpServer::admin(config.server.admin_addr, rate_limiter.clone())
        .serve_with_shutdown(wait_for_shutdown(shutdown_rx));

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    // Run both servers until a shutdown signal arrives
    tokio::try_join!(public, admin)?;

    rate_limiter.stop_sweeper();
    info!("Formgate Rate Limiting Service stopped");
    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .init(),
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
