//! Health and service index handlers.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Liveness check. Does not touch dependencies.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "order-service" }))
}

/// Readiness check.
///
/// Returns 503 Service Unavailable if the store does not answer.
pub async fn readiness(State(state): State<AppState>) -> Result<Json<Value>> {
    state.store().ping().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        AppError::Unavailable(e.to_string())
    })?;

    Ok(Json(json!({ "status": "ready" })))
}

/// `GET /` - service name, version and endpoint index.
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Order Service - Food Delivery System",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/auth/{register,login,me}",
            "restaurants": "/restaurants",
            "menu": "/restaurants/{id}/menu",
            "orders": "/orders",
            "health": "/health"
        }
    }))
}
