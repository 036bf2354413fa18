use std::sync::Arc;

use axum::{routing::get, Router};
use baja_scheduler::ScheduleManager;
use tower_http::trace::TraceLayer;

/// Shared state for the axum handlers.
pub struct AppState {
    pub manager: Arc<ScheduleManager>,
}

impl AppState {
    pub fn new(manager: Arc<ScheduleManager>) -> Self {
        Self { manager }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
