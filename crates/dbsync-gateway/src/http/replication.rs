//! Manual replication trigger: GET/POST /replication/start.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartParams {
    /// Wait for the pass to finish and report its outcome.
    #[serde(default)]
    pub wait: bool,
}

/// Starts one replication pass alongside the scheduled loop.
///
/// Returns 202 immediately, or with `?wait=true` 200 on success and 500 with
/// the failed databases otherwise.
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StartParams>,
) -> (StatusCode, Json<Value>) {
    debug!(wait = params.wait, "manual replication endpoint called");
    let pass = state.replicator.trigger();

    if !params.wait {
        return (
            StatusCode::ACCEPTED,
            Json(json!({"status": "replication started"})),
        );
    }

    let report = match pass.await {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "manual replication pass aborted");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "replication pass aborted", "code": "INTERNAL_ERROR"})),
            );
        }
    };

    let summary = report.summary();
    match report.into_result() {
        Ok(_) => {
            debug!("manual replication successful");
            (
                StatusCode::OK,
                Json(json!({"status": "replication completed", "report": summary})),
            )
        }
        Err(e) => {
            warn!(error = %e, "manual replication failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string(), "code": e.code(), "report": summary})),
            )
        }
    }
}
