//! SQLite-backed vector store.
//!
//! Chunk text and metadata live in a tenant-qualified table inside the
//! tenant's own database file; embeddings are stored as little-endian f32
//! blobs and searched by brute-force cosine similarity. Suitable for
//! knowledge bases in the tens of thousands of chunks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::WeaverError;
use crate::ingest::Chunk;
use crate::tenant::TenantNamespace;

use super::{ScoredChunk, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
    table: String,
    tenant_id: String,
}

impl SqliteVectorStore {
    /// Open (creating if missing) the collection for `namespace`. The table
    /// name and database path both derive from the validated tenant id, so
    /// collisions between tenants are structurally impossible.
    pub async fn open(namespace: &TenantNamespace) -> Result<Self, WeaverError> {
        let options = SqliteConnectOptions::new()
            .filename(namespace.db_path())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(WeaverError::storage)?;

        let store = Self {
            pool,
            table: namespace.collection.clone(),
            tenant_id: namespace.tenant_id.clone(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Quoted table identifier; tenant ids may contain `.` or `-`, which are
    /// only valid in SQL when the name is quoted. Tenant validation rejects
    /// quote characters, so interpolation is safe.
    fn quoted_table(&self) -> String {
        format!("\"{}\"", self.table)
    }

    async fn init_schema(&self) -> Result<(), WeaverError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                chunk_index INTEGER NOT NULL DEFAULT 0,
                total_chunks INTEGER NOT NULL DEFAULT 1,
                metadata TEXT NOT NULL DEFAULT '{{}}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
            self.quoted_table()
        ))
        .execute(&self.pool)
        .await
        .map_err(WeaverError::storage)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize, WeaverError> {
        if chunks.len() != embeddings.len() {
            return Err(WeaverError::Validation(format!(
                "chunk/embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(WeaverError::storage)?;

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            // The collection owns its tenant; whatever the caller put in the
            // metadata, the stored chunk carries the owning tenant id.
            let mut metadata = chunk.metadata.clone();
            metadata.insert("tenant".to_string(), self.tenant_id.clone());

            let metadata_json =
                serde_json::to_string(&metadata).map_err(WeaverError::internal)?;
            let source = metadata.get("source").cloned().unwrap_or_default();
            let blob = Self::serialize_embedding(embedding);

            sqlx::query(&format!(
                "INSERT OR REPLACE INTO {}
                     (chunk_id, content, source, chunk_index, total_chunks, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                self.quoted_table()
            ))
            .bind(&chunk.id)
            .bind(&chunk.text)
            .bind(&source)
            .bind(chunk.chunk_index as i64)
            .bind(chunk.total_chunks as i64)
            .bind(&metadata_json)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(WeaverError::storage)?;
        }

        tx.commit().await.map_err(WeaverError::storage)?;
        tracing::debug!(
            "Stored {} chunks in collection {}",
            chunks.len(),
            self.table
        );
        Ok(chunks.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, WeaverError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // rowid order is insertion order; the stable sort below keeps it as
        // the tie-break for equal scores.
        let rows = sqlx::query(&format!(
            "SELECT chunk_id, content, chunk_index, total_chunks, metadata, embedding
             FROM {} ORDER BY rowid",
            self.quoted_table()
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(WeaverError::storage)?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored);

                let metadata_json: String = row.get("metadata");
                let metadata: BTreeMap<String, String> =
                    serde_json::from_str(&metadata_json).unwrap_or_default();

                Some(ScoredChunk {
                    chunk: Chunk {
                        id: row.get("chunk_id"),
                        text: row.get("content"),
                        chunk_index: row.get::<i64, _>("chunk_index") as usize,
                        total_chunks: row.get::<i64, _>("total_chunks") as usize,
                        metadata,
                    },
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn count(&self) -> Result<usize, WeaverError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.quoted_table()))
            .fetch_one(&self.pool)
            .await
            .map_err(WeaverError::storage)?;
        Ok(count as usize)
    }

    async fn count_by_source(&self) -> Result<BTreeMap<String, usize>, WeaverError> {
        let rows = sqlx::query(&format!(
            "SELECT source, COUNT(*) AS n FROM {} GROUP BY source ORDER BY source",
            self.quoted_table()
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(WeaverError::storage)?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let source: String = row.get("source");
            let n: i64 = row.get("n");
            counts.insert(source, n as usize);
        }
        Ok(counts)
    }

    async fn clear(&self) -> Result<usize, WeaverError> {
        let result = sqlx::query(&format!("DELETE FROM {}", self.quoted_table()))
            .execute(&self.pool)
            .await
            .map_err(WeaverError::storage)?;

        tracing::info!(
            "Cleared {} chunks from collection {}",
            result.rows_affected(),
            self.table
        );
        Ok(result.rows_affected() as usize)
    }
}
