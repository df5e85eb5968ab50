use async_trait::async_trait;

use crate::core::errors::WeaverError;

/// Whether an embedding is for a stored document or a retrieval query.
/// Providers may tune vectors per intent; both intents must share one
/// dimensionality and similarity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskIntent {
    Document,
    Query,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// provider name (e.g. "gemini")
    fn name(&self) -> &str;

    /// vector dimensionality, constant for the lifetime of a collection
    fn dim(&self) -> usize;

    /// embed a batch of texts; output has the same length and order as the
    /// input. Errors with `WeaverError::Provider` on transport failure,
    /// timeout, or a non-success response.
    async fn embed(&self, texts: &[String], intent: TaskIntent)
        -> Result<Vec<Vec<f32>>, WeaverError>;

    /// embed a single text
    async fn embed_one(&self, text: &str, intent: TaskIntent) -> Result<Vec<f32>, WeaverError> {
        let mut vectors = self.embed(&[text.to_string()], intent).await?;
        vectors
            .pop()
            .ok_or_else(|| WeaverError::Provider("provider returned no embedding".to_string()))
    }
}

#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// provider name (e.g. "gemini")
    fn name(&self) -> &str;

    /// single-shot answer generation from a fully assembled prompt
    async fn generate(&self, prompt: &str) -> Result<String, WeaverError>;
}
