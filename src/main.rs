//! promwatch
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - PROMWATCH_BACKEND_URL: Metrics backend base URL (default: https://prometheus.example.com:9090)
//! - PROMWATCH_CONFIG: Services file (default: config.json)
//! - PROMWATCH_POLL_INTERVAL_SECS: Polling interval (default: 120)
//! - PROMWATCH_RECHECK_COOLDOWN_SECS: Delay before a breach is rechecked (default: 300)
//! - PROMWATCH_REQUEST_TIMEOUT_SECS: Backend request timeout (default: 30)
//! - PROMWATCH_MAX_CONCURRENCY: Concurrent service evaluations (default: 16)
//! - PROMWATCH_HOST / PROMWATCH_PORT: Status API bind address (disabled unless PORT is set)
//! - PROMWATCH_OUTCOME_HISTORY: Outcomes kept for the status API (default: 256)
//! - RUST_LOG: Log level (default: info)

use promwatch::app;
use promwatch::config::MonitorConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env();

    tracing::info!("promwatch configuration:");
    tracing::info!("  Backend: {}", config.backend_url);
    tracing::info!("  Services file: {}", config.services_path);
    tracing::info!("  Poll interval: {:?}", config.poll_interval);
    tracing::info!("  Recheck cooldown: {:?}", config.recheck_cooldown);
    tracing::info!("  Request timeout: {:?}", config.request_timeout);
    tracing::info!("  Max concurrency: {}", config.max_concurrency);
    match config.port {
        Some(port) => tracing::info!("  Status API: {}:{}", config.host, port),
        None => tracing::info!("  Status API: DISABLED"),
    }

    app::run(config).await
}
