use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::WeaverError;
use crate::ingest::{RawRecord, SourceKind};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub source_kind: SourceKind,
    pub records: Vec<RawRecord>,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<Value>, WeaverError> {
    if request.records.is_empty() {
        return Err(WeaverError::Validation(
            "at least one record is required".to_string(),
        ));
    }

    let report = state
        .engine
        .ingest(&tenant, request.source_kind, &request.records)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "source_kind": request.source_kind,
        "records_received": request.records.len(),
        "chunks_created": report.chunks_created,
        "chunks_stored": report.chunks_stored,
    })))
}
