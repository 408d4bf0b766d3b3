//! Liveness endpoint

use axum::Json;

use crate::types::HealthResponse;

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
