use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::alerts::{Outcome, OutcomeCounts, OutcomeLog, ServiceMonitor};
use crate::config::ServiceSpec;

/// Application state shared across handlers
pub struct AppState {
    pub monitor: Arc<ServiceMonitor>,
    pub outcomes: Arc<OutcomeLog>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Services
// ============================================================================

#[derive(Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceSpec>,
}

pub async fn list_services(State(state): State<Arc<AppState>>) -> Json<ServicesResponse> {
    let services = state.monitor.services().iter().cloned().collect();
    Json(ServicesResponse { services })
}

#[derive(Serialize)]
pub struct ServiceDetail {
    #[serde(flatten)]
    pub spec: ServiceSpec,
    pub monitored: bool,
    pub recent: Vec<Outcome>,
}

pub async fn service_detail(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ServiceDetail>, ApiError> {
    let spec = state
        .monitor
        .services()
        .get(&name)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Service '{}' not found", name)))?;

    let mut recent = state.outcomes.for_service(&name);
    recent.reverse();

    Ok(Json(ServiceDetail {
        monitored: spec.is_monitored(),
        spec,
        recent,
    }))
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Deserialize)]
pub struct OutcomesParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Serialize)]
pub struct OutcomesResponse {
    pub outcomes: Vec<Outcome>,
}

pub async fn outcomes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OutcomesParams>,
) -> Json<OutcomesResponse> {
    Json(OutcomesResponse {
        outcomes: state.outcomes.recent(params.limit),
    })
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub services: usize,
    pub monitored: usize,
    pub ticks: u64,
    pub rechecks_in_flight: usize,
    #[serde(flatten)]
    pub counts: OutcomeCounts,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let services = state.monitor.services();

    Json(StatsResponse {
        services: services.len(),
        monitored: services.monitored().count(),
        ticks: state.monitor.ticks(),
        rechecks_in_flight: state.monitor.scheduler().in_flight(),
        counts: state.outcomes.counts(),
    })
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
