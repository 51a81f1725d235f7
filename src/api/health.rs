use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::api::state::AppState;
use crate::store::RecordStore;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub dependencies: DependencyStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub record_store: ServiceHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    pub backend: String,
    pub response_time_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check endpoint
/// Returns 200 if the record store answers, 503 otherwise
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_health = check_store(state.store.as_ref()).await;
    let healthy = store_health.status == "healthy";

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dependencies: DependencyStatus {
            record_store: store_health,
        },
    };

    tracing::debug!(status = %response.status, "Health check completed");

    (status_code, Json(response))
}

/// Check record store connectivity
async fn check_store(store: &dyn RecordStore) -> ServiceHealth {
    let start = Instant::now();

    match store.ping().await {
        Ok(()) => ServiceHealth {
            status: "healthy".to_string(),
            backend: store.backend_tag().to_string(),
            response_time_ms: start.elapsed().as_millis(),
            error: None,
        },
        Err(e) => ServiceHealth {
            status: "unhealthy".to_string(),
            backend: store.backend_tag().to_string(),
            response_time_ms: start.elapsed().as_millis(),
            error: Some(e.to_string()),
        },
    }
}
