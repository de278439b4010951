use axum::{routing::get, Router};
use dbsync_core::config::DbsyncConfig;
use dbsync_scheduler::Replicator;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: DbsyncConfig,
    pub replicator: Replicator,
}

impl AppState {
    pub fn new(config: DbsyncConfig, replicator: Replicator) -> Self {
        Self { config, replicator }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/replication/start",
            get(crate::http::replication::start_handler)
                .post(crate::http::replication::start_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
