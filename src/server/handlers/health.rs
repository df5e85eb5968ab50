use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = state.engine.status();
    let overall = if status.overall == "ready" {
        "healthy"
    } else {
        "degraded"
    };

    Json(json!({
        "status": overall,
        "version": env!("CARGO_PKG_VERSION"),
        "components": status,
        "started_at": state.started_at.to_rfc3339(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
