//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: StorageHealth,
    pub generation: GenerationHealth,
}

/// Storage health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageHealth {
    pub backend: String,
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Generation backend status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GenerationHealth {
    pub configured: bool,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check endpoint.
///
/// Returns storage reachability and whether the generation backend has
/// credentials.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let store = state.entitlements.store();
    let start = std::time::Instant::now();
    let connected = store.ping().await.is_ok();
    let latency_ms = start.elapsed().as_millis() as u64;

    let response = HealthResponse {
        status: if connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: StorageHealth {
            backend: store.backend_name().to_string(),
            connected,
            latency_ms: if connected { Some(latency_ms) } else { None },
        },
        generation: GenerationHealth {
            configured: state.pipeline.is_configured(),
        },
    };

    if connected {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 OK if storage is reachable.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    if state.entitlements.store().ping().await.is_ok() {
        Ok(Json(StatusResponse {
            status: "ready".to_string(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
