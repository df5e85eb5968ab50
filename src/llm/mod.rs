pub mod gemini;
pub mod handle;
pub mod provider;

pub use gemini::GeminiClient;
pub use handle::ProviderHandle;
pub use provider::{EmbeddingProvider, GenerativeProvider, TaskIntent};

/// Embed `texts` in provider-sized sub-batches, degrading failed sub-batches
/// to zero vectors instead of aborting the whole call.
///
/// The output always has the same length and order as the input, so
/// chunk/embedding alignment survives partial provider outages. Indices of
/// degraded texts are returned so callers can mark the affected chunks;
/// retrieval quality for those chunks silently drops until they are
/// re-embedded.
pub async fn embed_batch_degraded(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    intent: TaskIntent,
    batch_size: usize,
) -> (Vec<Vec<f32>>, Vec<usize>) {
    let batch_size = batch_size.max(1);
    let mut embeddings = Vec::with_capacity(texts.len());
    let mut degraded = Vec::new();

    for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
        match provider.embed(batch, intent).await {
            Ok(vectors) => embeddings.extend(vectors),
            Err(err) => {
                tracing::warn!(
                    "Embedding sub-batch {} of {} texts failed: {}; storing zero vectors",
                    batch_index + 1,
                    batch.len(),
                    err
                );
                let start = batch_index * batch_size;
                degraded.extend(start..start + batch.len());
                embeddings.extend(std::iter::repeat(vec![0.0; provider.dim()]).take(batch.len()));
            }
        }
    }

    (embeddings, degraded)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::core::errors::WeaverError;

    use super::provider::{EmbeddingProvider, GenerativeProvider, TaskIntent};

    /// Embeds each text as a unit-ish vector derived from its bytes; batches
    /// past `fail_after` calls error to exercise degradation paths.
    pub struct StubEmbedder {
        pub dim: usize,
        pub fail_after: Option<usize>,
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        pub fn new(dim: usize) -> Self {
            Self {
                dim,
                fail_after: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing_after(dim: usize, calls: usize) -> Self {
            Self {
                dim,
                fail_after: Some(calls),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut vector = vec![0.0_f32; self.dim];
            for (i, byte) in text.bytes().enumerate() {
                vector[i % self.dim] += byte as f32;
            }
            let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for value in &mut vector {
                    *value /= norm;
                }
            }
            vector
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        fn name(&self) -> &str {
            "stub"
        }

        fn dim(&self) -> usize {
            self.dim
        }

        async fn embed(
            &self,
            texts: &[String],
            _intent: TaskIntent,
        ) -> Result<Vec<Vec<f32>>, WeaverError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_after {
                if call >= limit {
                    return Err(WeaverError::Provider("stub embedder down".to_string()));
                }
            }
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }
    }

    /// Returns a canned answer, or a provider error when `available` is false.
    pub struct StubGenerator {
        pub available: bool,
        pub answer: String,
    }

    #[async_trait]
    impl GenerativeProvider for StubGenerator {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, WeaverError> {
            if self.available {
                Ok(self.answer.clone())
            } else {
                Err(WeaverError::Provider("stub generator down".to_string()))
            }
        }
    }
}
