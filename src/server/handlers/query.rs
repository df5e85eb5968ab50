use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::WeaverError;
use crate::state::AppState;
use crate::store::ScoredChunk;

/// Transport-level cap on source text; the full chunk stays in the store.
const SOURCE_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Value>, WeaverError> {
    let outcome = state
        .engine
        .ask(&tenant, &request.question, request.max_results)
        .await?;

    Ok(Json(json!({
        "answer": outcome.answer,
        "query": request.question,
        "model_used": outcome.model_used,
        "elapsed_ms": outcome.elapsed.as_millis() as u64,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "sources": outcome.sources.iter().map(source_json).collect::<Vec<_>>(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, WeaverError> {
    let limit = params.limit.unwrap_or(state.settings.max_results);
    let results = state.engine.search(&tenant, &params.q, limit).await?;

    Ok(Json(json!({
        "query": params.q,
        "total_found": results.len(),
        "results": results.iter().map(source_json).collect::<Vec<_>>(),
    })))
}

fn source_json(scored: &ScoredChunk) -> Value {
    let meta = &scored.chunk.metadata;
    json!({
        "chunk_id": scored.chunk.id,
        "text": preview(&scored.chunk.text),
        "source": meta.get("source"),
        "type": meta.get("type"),
        "title": meta.get("title"),
        "author": meta.get("author"),
        "url": meta.get("url"),
        "created_at": meta.get("created_at"),
        "similarity_score": scored.score,
        "metadata": meta,
    })
}

fn preview(text: &str) -> String {
    if text.chars().count() <= SOURCE_PREVIEW_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(SOURCE_PREVIEW_CHARS).collect();
    format!("{truncated}...")
}
