use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_check, list_services, outcomes, service_detail, stats, AppState};
use crate::alerts::ShutdownSignal;

/// Build the status API router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/services", get(list_services))
        .route("/services/:name", get(service_detail))
        .route("/outcomes", get(outcomes))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the status API until `shutdown` fires
pub async fn serve(
    host: &str,
    port: u16,
    state: Arc<AppState>,
    mut shutdown: ShutdownSignal,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Status API listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    tracing::info!("Status API stopped");
    Ok(())
}
