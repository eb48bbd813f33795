use axum::{extract::State, Json};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::AppState;

/// Liveness with a store round trip.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": state.config.store.backend.to_string()
        }
    })))
}

pub async fn readiness() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}
