use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::WeaverError;
use crate::state::AppState;

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> Result<Json<Value>, WeaverError> {
    let stats = state.engine.stats(&tenant).await?;
    Ok(Json(json!(stats)))
}

pub async fn clear(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> Result<Json<Value>, WeaverError> {
    let report = state.engine.clear(&tenant).await?;
    Ok(Json(json!({
        "status": "success",
        "chunks_removed": report.chunks_removed,
    })))
}
