use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe with the number of running schedule tasks.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(health_payload(state.manager.active_count()))
}

fn health_payload(active_schedules: usize) -> Value {
    json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_schedules": active_schedules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_reports_version_and_task_count() {
        let body = health_payload(3);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["active_schedules"], 3);
    }
}
