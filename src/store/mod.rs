//! Per-tenant persistent vector storage.

pub mod sqlite;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::core::errors::WeaverError;
use crate::ingest::Chunk;
use crate::tenant::TenantNamespace;

pub use sqlite::SqliteVectorStore;

/// One retrieved chunk with its similarity score (`1 - distance`, higher is
/// better).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Abstract vector-store collection, exclusively owned by one tenant.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert chunks with their embeddings. Rejects mismatched-length
    /// batches with a validation error; persisted durably before returning.
    /// Returns the number of chunks stored.
    async fn insert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>])
        -> Result<usize, WeaverError>;

    /// Nearest-neighbor search. At most `k` results, descending by score,
    /// ties broken by insertion order. An empty collection returns an empty
    /// vec, not an error.
    async fn search(&self, query_embedding: &[f32], k: usize)
        -> Result<Vec<ScoredChunk>, WeaverError>;

    /// Exact number of stored chunks.
    async fn count(&self) -> Result<usize, WeaverError>;

    /// Exact chunk count per source system.
    async fn count_by_source(&self) -> Result<BTreeMap<String, usize>, WeaverError>;

    /// Delete every chunk, leaving an empty, usable collection. Idempotent.
    /// Returns the number of chunks removed.
    async fn clear(&self) -> Result<usize, WeaverError>;
}

/// An open tenant collection plus the lock that serializes its writes.
///
/// Reads stay unsynchronized with writes; only concurrent inserts for the
/// same tenant contend here, which keeps chunk-id assignment race-free.
pub struct TenantEntry {
    pub namespace: TenantNamespace,
    pub store: SqliteVectorStore,
    pub write_lock: Mutex<()>,
}

/// Cache of per-tenant stores, keyed by validated tenant id. Each tenant
/// maps to its own database file, so no two handles can ever reference the
/// same physical collection.
pub struct TenantStores {
    users_dir: PathBuf,
    entries: RwLock<HashMap<String, Arc<TenantEntry>>>,
}

impl TenantStores {
    pub fn new(users_dir: PathBuf) -> Self {
        Self {
            users_dir,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The tenant's entry, opening (and creating) its collection on first
    /// use.
    pub async fn entry(&self, tenant_id: &str) -> Result<Arc<TenantEntry>, WeaverError> {
        if let Some(entry) = self.entries.read().await.get(tenant_id) {
            return Ok(entry.clone());
        }

        let namespace = TenantNamespace::resolve(&self.users_dir, tenant_id)?;
        namespace.ensure_dirs()?;

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(tenant_id) {
            return Ok(entry.clone());
        }

        let store = SqliteVectorStore::open(&namespace).await?;
        let entry = Arc::new(TenantEntry {
            namespace,
            store,
            write_lock: Mutex::new(()),
        });
        entries.insert(tenant_id.to_string(), entry.clone());
        Ok(entry)
    }
}
