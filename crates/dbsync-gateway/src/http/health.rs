use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe; `ready` flips once both databases answered.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ready": state.replicator.is_ready(),
        "jobs": state.replicator.jobs().len(),
        "interval_minutes": state.config.time_interval_minutes,
    }))
}
