pub mod chunker;
pub mod normalize;
pub mod record;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use chunker::{Chunker, TokenCounter};
pub use normalize::normalize;
pub use record::{RawComment, RawRecord, SourceKind};

/// The unit of retrieval: a bounded, independently embeddable piece of a
/// source record plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id: `{source}_{record_id}_{chunk_index}`. Re-ingesting
    /// the same record overwrites the same ids.
    pub id: String,
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Ordered string map; also carries `chunk_index`/`total_chunks` so the
    /// persisted metadata is self-describing.
    pub metadata: BTreeMap<String, String>,
}

/// Build the deterministic chunk id for `(source, record_id, chunk_index)`.
pub fn chunk_id(source: &str, record_id: &str, chunk_index: usize) -> String {
    let raw = format!("{source}_{record_id}_{chunk_index}");
    raw.replace(['/', ' '], "_")
}
