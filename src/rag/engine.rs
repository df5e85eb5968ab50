//! The retrieval engine: per-query orchestration and the ingestion
//! pipeline, both tenant-scoped.
//!
//! A query moves through embed → retrieve → synthesize exactly once; there
//! are no retries at this layer. Provider failures degrade (extractive
//! fallback, placeholder vectors) while storage failures surface to the
//! caller, since chunk-id integrity cannot be guaranteed over a broken
//! store.

use std::collections::BTreeMap;
use std::fs;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;

use crate::core::config::Settings;
use crate::core::errors::WeaverError;
use crate::ingest::{Chunk, Chunker, RawRecord, SourceKind};
use crate::llm::{
    embed_batch_degraded, EmbeddingProvider, GenerativeProvider, ProviderHandle, TaskIntent,
};
use crate::store::{ScoredChunk, TenantStores, VectorStore};
use crate::tenant::TenantNamespace;

use super::context;

/// Result of one query. `elapsed` covers receipt to return and is populated
/// on every path, including failures.
#[derive(Debug)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<ScoredChunk>,
    pub model_used: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub chunks_created: usize,
    pub chunks_stored: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantStats {
    pub tenant: String,
    pub total_chunks: usize,
    pub sources: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearReport {
    pub chunks_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub embedder: &'static str,
    pub generator: &'static str,
    pub overall: &'static str,
}

pub struct RagEngine {
    settings: Settings,
    chunker: Chunker,
    embedder: ProviderHandle<dyn EmbeddingProvider>,
    generator: ProviderHandle<dyn GenerativeProvider>,
    stores: TenantStores,
}

impl RagEngine {
    pub fn new(
        settings: Settings,
        embedder: ProviderHandle<dyn EmbeddingProvider>,
        generator: ProviderHandle<dyn GenerativeProvider>,
        stores: TenantStores,
    ) -> Self {
        Self {
            chunker: Chunker::new(&settings),
            settings,
            embedder,
            generator,
            stores,
        }
    }

    pub fn status(&self) -> EngineStatus {
        let embedder = self.embedder.status();
        let generator = self.generator.status();
        let overall = if self.embedder.is_available() && self.generator.is_available() {
            "ready"
        } else {
            "degraded"
        };
        EngineStatus {
            embedder,
            generator,
            overall,
        }
    }

    /// Answer `question` from the tenant's knowledge base.
    ///
    /// Always returns a best-effort answer when retrieval can run; only
    /// storage unavailability (or invalid input) errors out.
    pub async fn ask(
        &self,
        tenant_id: &str,
        question: &str,
        max_results: Option<usize>,
    ) -> Result<QueryOutcome, WeaverError> {
        let started = Instant::now();

        let question = question.trim();
        self.validate_question(question)?;
        let entry = self.stores.entry(tenant_id).await?;
        let k = max_results.unwrap_or(self.settings.max_results).max(1);

        // Embedding: a provider failure here is terminal for the query.
        let query_embedding = match self.embed_query(question).await {
            Ok(embedding) => embedding,
            Err(err) => {
                tracing::warn!("Query embedding failed for {}: {}", tenant_id, err);
                return Ok(QueryOutcome {
                    answer: "The embedding service is currently unavailable, so your \
                             question could not be processed. Please try again later."
                        .to_string(),
                    sources: Vec::new(),
                    model_used: "none".to_string(),
                    elapsed: started.elapsed(),
                });
            }
        };

        // Retrieving: an empty result set is not a failure.
        let sources = entry.store.search(&query_embedding, k).await?;

        // Synthesizing, with the extractive fallback on provider errors.
        let (answer, model_used) = self.synthesize(question, &sources).await?;

        Ok(QueryOutcome {
            answer,
            sources,
            model_used,
            elapsed: started.elapsed(),
        })
    }

    /// Retrieval without synthesis: the tenant's top-`limit` chunks for
    /// `query`.
    pub async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, WeaverError> {
        let query = query.trim();
        self.validate_question(query)?;
        let entry = self.stores.entry(tenant_id).await?;
        let query_embedding = self.embed_query(query).await?;
        entry.store.search(&query_embedding, limit.max(1)).await
    }

    /// Ingest a batch of records: chunk, embed (degrading failed sub-batches
    /// to zero vectors), and store under the tenant's write lock.
    pub async fn ingest(
        &self,
        tenant_id: &str,
        kind: SourceKind,
        records: &[RawRecord],
    ) -> Result<IngestReport, WeaverError> {
        let entry = self.stores.entry(tenant_id).await?;
        save_raw_payload(&entry.namespace, kind, records);

        let mut chunks: Vec<Chunk> = Vec::new();
        for record in records {
            for unit in record.units(kind) {
                chunks.extend(self.chunker.chunk(&unit.text, &unit.metadata));
            }
        }

        if chunks.is_empty() {
            return Ok(IngestReport {
                chunks_created: 0,
                chunks_stored: 0,
            });
        }

        let embedder = self.embedder.get()?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let (embeddings, degraded) = embed_batch_degraded(
            embedder.as_ref(),
            &texts,
            TaskIntent::Document,
            self.settings.embed_batch_size,
        )
        .await;
        for index in &degraded {
            chunks[*index]
                .metadata
                .insert("embedding_degraded".to_string(), "true".to_string());
        }

        let stored = {
            let _guard = entry.write_lock.lock().await;
            entry.store.insert(&chunks, &embeddings).await?
        };

        save_processed_chunks(&entry.namespace, &self.settings, &chunks);

        tracing::info!(
            "Ingested {} {} records into {} chunks for {}",
            records.len(),
            kind,
            stored,
            tenant_id
        );
        Ok(IngestReport {
            chunks_created: chunks.len(),
            chunks_stored: stored,
        })
    }

    pub async fn stats(&self, tenant_id: &str) -> Result<TenantStats, WeaverError> {
        let entry = self.stores.entry(tenant_id).await?;
        Ok(TenantStats {
            tenant: tenant_id.to_string(),
            total_chunks: entry.store.count().await?,
            sources: entry.store.count_by_source().await?,
        })
    }

    /// Empty the tenant's knowledge base: all chunks deleted, collection
    /// left usable, raw/processed areas reset. Other tenants are unaffected.
    pub async fn clear(&self, tenant_id: &str) -> Result<ClearReport, WeaverError> {
        let entry = self.stores.entry(tenant_id).await?;
        let chunks_removed = {
            let _guard = entry.write_lock.lock().await;
            entry.store.clear().await?
        };

        for dir in [&entry.namespace.raw_dir, &entry.namespace.processed_dir] {
            let _ = fs::remove_dir_all(dir);
            let _ = fs::create_dir_all(dir);
        }

        Ok(ClearReport { chunks_removed })
    }

    fn validate_question(&self, question: &str) -> Result<(), WeaverError> {
        if question.is_empty() {
            return Err(WeaverError::Validation(
                "question must not be empty".to_string(),
            ));
        }
        if question.chars().count() > self.settings.max_question_len {
            return Err(WeaverError::Validation(format!(
                "question too long (max {} characters)",
                self.settings.max_question_len
            )));
        }
        Ok(())
    }

    async fn embed_query(&self, question: &str) -> Result<Vec<f32>, WeaverError> {
        let embedder = self.embedder.get()?;
        embedder.embed_one(question, TaskIntent::Query).await
    }

    /// Call the answer provider; fall back to extraction only on a typed
    /// provider error. Anything else is a bug and propagates.
    async fn synthesize(
        &self,
        question: &str,
        sources: &[ScoredChunk],
    ) -> Result<(String, String), WeaverError> {
        let generator = match self.generator.get() {
            Ok(generator) => generator,
            Err(WeaverError::Provider(reason)) => {
                tracing::warn!("Answer provider not configured: {}", reason);
                return Ok((context::extractive_answer(question, sources), fallback_model()));
            }
            Err(other) => return Err(other),
        };

        let prompt = context::build_prompt(question, sources, self.settings.max_context_chars);
        match generator.generate(&prompt).await {
            Ok(answer) => Ok((answer, self.settings.chat_model.clone())),
            Err(WeaverError::Provider(reason)) => {
                tracing::warn!("Answer generation failed: {}; using extractive fallback", reason);
                Ok((context::extractive_answer(question, sources), fallback_model()))
            }
            Err(other) => Err(other),
        }
    }
}

fn fallback_model() -> String {
    "extractive-fallback".to_string()
}

/// Persist the raw ingestion payload under the tenant's raw area. Best
/// effort: the vector store is the durability boundary, these files are an
/// audit trail.
fn save_raw_payload(namespace: &TenantNamespace, kind: SourceKind, records: &[RawRecord]) {
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
    let path = namespace.raw_dir.join(format!("{kind}_{stamp}.json"));
    let payload = json!({
        "source": kind.to_string(),
        "fetched_at": chrono::Utc::now().to_rfc3339(),
        "records": records,
    });
    match serde_json::to_string_pretty(&payload) {
        Ok(body) => {
            if let Err(err) = fs::write(&path, body) {
                tracing::warn!("Could not save raw payload to {}: {}", path.display(), err);
            }
        }
        Err(err) => tracing::warn!("Could not serialize raw payload: {}", err),
    }
}

/// Persist the processed chunks alongside the raw payload.
fn save_processed_chunks(namespace: &TenantNamespace, settings: &Settings, chunks: &[Chunk]) {
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
    let path = namespace
        .processed_dir
        .join(format!("chunks_{stamp}.json"));
    let payload = json!({
        "processed_at": chrono::Utc::now().to_rfc3339(),
        "total_chunks": chunks.len(),
        "chunk_size": settings.chunk_size,
        "chunks": chunks,
    });
    match serde_json::to_string_pretty(&payload) {
        Ok(body) => {
            if let Err(err) = fs::write(&path, body) {
                tracing::warn!(
                    "Could not save processed chunks to {}: {}",
                    path.display(),
                    err
                );
            }
        }
        Err(err) => tracing::warn!("Could not serialize processed chunks: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::llm::testing::{StubEmbedder, StubGenerator};

    use super::*;

    fn engine_with(
        root: &std::path::Path,
        embedder: ProviderHandle<dyn EmbeddingProvider>,
        generator: ProviderHandle<dyn GenerativeProvider>,
    ) -> RagEngine {
        let settings = Settings {
            chunk_size: 500,
            embed_batch_size: 3,
            ..Settings::default()
        };
        RagEngine::new(settings, embedder, generator, TenantStores::new(root.into()))
    }

    fn healthy_engine(root: &std::path::Path) -> RagEngine {
        engine_with(
            root,
            ProviderHandle::available(Arc::new(StubEmbedder::new(16))),
            ProviderHandle::available(Arc::new(StubGenerator {
                available: true,
                answer: "Login fails because the token expires (Source 1).".to_string(),
            })),
        )
    }

    fn record(id: &str, text: &str) -> RawRecord {
        serde_json::from_value(json!({ "id": id, "body": text })).unwrap()
    }

    #[tokio::test]
    async fn single_record_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let engine = healthy_engine(dir.path());

        let report = engine
            .ingest(
                "alice",
                SourceKind::Github,
                &[record(
                    "42",
                    "Login fails when token expires. Retry logic is missing.",
                )],
            )
            .await
            .unwrap();
        assert_eq!(report.chunks_created, 1);
        assert_eq!(report.chunks_stored, 1);

        let stats = engine.stats("alice").await.unwrap();
        assert_eq!(stats.total_chunks, 1);

        let outcome = engine
            .ask("alice", "why does login fail", None)
            .await
            .unwrap();
        assert!(outcome.answer.contains("Source 1"));
        assert_eq!(outcome.sources.len(), 1);
        assert!(outcome.sources[0].chunk.id.contains("42"));
        assert!(outcome.sources[0].score > 0.0);
        assert!(outcome.elapsed >= Duration::ZERO);
    }

    #[tokio::test]
    async fn generator_outage_falls_back_to_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            ProviderHandle::available(Arc::new(StubEmbedder::new(16))),
            ProviderHandle::available(Arc::new(StubGenerator {
                available: false,
                answer: String::new(),
            })),
        );

        engine
            .ingest(
                "alice",
                SourceKind::Github,
                &[
                    record("1", "The retry loop never runs. It was removed in a refactor."),
                    record("2", "Session tokens expire after an hour. Nobody renews them."),
                ],
            )
            .await
            .unwrap();

        let outcome = engine.ask("alice", "what is broken", Some(5)).await.unwrap();
        assert_eq!(outcome.model_used, "extractive-fallback");
        assert!(!outcome.answer.is_empty());
        assert!(outcome.answer.contains("retry loop") || outcome.answer.contains("Session tokens"));
        assert!(outcome.answer.contains("Source 1"));
        assert!(outcome.answer.contains("Source 2"));
        assert_eq!(outcome.sources.len(), 2);
    }

    #[tokio::test]
    async fn empty_tenant_answers_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            ProviderHandle::available(Arc::new(StubEmbedder::new(16))),
            ProviderHandle::unavailable("not configured"),
        );

        let outcome = engine
            .ask("fresh-tenant", "anything indexed yet?", None)
            .await
            .unwrap();
        assert!(outcome.sources.is_empty());
        assert!(outcome.answer.contains("couldn't find any relevant information"));
    }

    #[tokio::test]
    async fn embedding_outage_is_terminal_with_an_explanation() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            ProviderHandle::unavailable("GOOGLE_API_KEY not set"),
            ProviderHandle::unavailable("GOOGLE_API_KEY not set"),
        );

        let outcome = engine.ask("alice", "does anything work", None).await.unwrap();
        assert!(outcome.answer.contains("unavailable"));
        assert!(outcome.sources.is_empty());
        assert_eq!(outcome.model_used, "none");
    }

    #[tokio::test]
    async fn failed_embedding_batch_still_stores_chunks_as_degraded() {
        let dir = tempfile::tempdir().unwrap();
        // Every embed call fails; ingest degrades the whole batch.
        let engine = engine_with(
            dir.path(),
            ProviderHandle::available(Arc::new(StubEmbedder::failing_after(16, 0))),
            ProviderHandle::unavailable("not configured"),
        );

        let report = engine
            .ingest(
                "alice",
                SourceKind::Github,
                &[
                    record("1", "First record."),
                    record("2", "Second record."),
                    record("3", "Third record."),
                ],
            )
            .await
            .unwrap();
        assert_eq!(report.chunks_stored, 3);

        let stats = engine.stats("alice").await.unwrap();
        assert_eq!(stats.total_chunks, 3);

        let entry = engine.stores.entry("alice").await.unwrap();
        let hits = entry.store.search(&[1.0; 16], 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        for hit in &hits {
            assert_eq!(hit.chunk.metadata.get("embedding_degraded").unwrap(), "true");
            assert_eq!(hit.score, 0.0);
        }
    }

    #[tokio::test]
    async fn tenants_never_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let engine = healthy_engine(dir.path());

        let records = [record("7", "Shared content ingested by two tenants.")];
        engine
            .ingest("alice", SourceKind::Github, &records)
            .await
            .unwrap();
        engine
            .ingest("bob", SourceKind::Github, &records)
            .await
            .unwrap();

        let hits = engine.search("alice", "shared content", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.metadata.get("tenant").unwrap(), "alice");

        engine.clear("alice").await.unwrap();
        assert_eq!(engine.stats("alice").await.unwrap().total_chunks, 0);
        assert_eq!(engine.stats("bob").await.unwrap().total_chunks, 1);
    }

    #[tokio::test]
    async fn stats_break_down_by_source() {
        let dir = tempfile::tempdir().unwrap();
        let engine = healthy_engine(dir.path());

        engine
            .ingest(
                "alice",
                SourceKind::Github,
                &[record("1", "Issue text."), record("2", "Another issue.")],
            )
            .await
            .unwrap();
        engine
            .ingest("alice", SourceKind::Slack, &[record("3", "A chat message.")])
            .await
            .unwrap();

        let stats = engine.stats("alice").await.unwrap();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.sources.get("github"), Some(&2));
        assert_eq!(stats.sources.get("slack"), Some(&1));
    }

    #[tokio::test]
    async fn validation_rejects_empty_and_oversized_questions() {
        let dir = tempfile::tempdir().unwrap();
        let engine = healthy_engine(dir.path());

        assert!(matches!(
            engine.ask("alice", "   ", None).await,
            Err(WeaverError::Validation(_))
        ));
        let long = "x".repeat(2000);
        assert!(matches!(
            engine.ask("alice", &long, None).await,
            Err(WeaverError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn invalid_tenant_ids_are_rejected_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let engine = healthy_engine(dir.path());

        assert!(matches!(
            engine.ask("../etc", "question", None).await,
            Err(WeaverError::Validation(_))
        ));
        assert!(matches!(
            engine.stats("a/b").await,
            Err(WeaverError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn raw_and_processed_payloads_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let engine = healthy_engine(dir.path());

        engine
            .ingest("alice", SourceKind::Github, &[record("1", "Some text.")])
            .await
            .unwrap();

        let namespace = TenantNamespace::resolve(dir.path(), "alice").unwrap();
        let raw_files: Vec<_> = fs::read_dir(&namespace.raw_dir).unwrap().collect();
        let processed_files: Vec<_> = fs::read_dir(&namespace.processed_dir).unwrap().collect();
        assert_eq!(raw_files.len(), 1);
        assert_eq!(processed_files.len(), 1);

        engine.clear("alice").await.unwrap();
        assert_eq!(fs::read_dir(&namespace.raw_dir).unwrap().count(), 0);
    }
}
